use std::fs;
use std::io;
use std::path::Path;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

/// Creates a named pipe at `path` with mode `0600`, deleting any existing
/// one first.
pub fn create(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    mkfifo(path, Mode::from_bits_truncate(0o600))
        .map_err(|e| io::Error::other(format!("mkfifo {}: {e}", path.display())))
}
