use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Spawns the decompression side of a FIFO handoff: a background worker
/// opens `fifo_path` for writing (which blocks until the loader opens the
/// read end) and pipes `gunzip -c shard_path` into it. Runs on an OS
/// thread rather than a forked child process; the join handle plays the
/// role `wait(2)` would on a forked decompression child.
pub fn decompress_to_path(shard_path: &Path, fifo_path: &Path) -> JoinHandle<io::Result<()>> {
    let shard_path = shard_path.to_path_buf();
    let fifo_path = fifo_path.to_path_buf();

    thread::spawn(move || run_decompress(&shard_path, &fifo_path))
}

fn run_decompress(shard_path: &PathBuf, fifo_path: &PathBuf) -> io::Result<()> {
    debug!(shard = %shard_path.display(), fifo = %fifo_path.display(), "opening fifo for write");
    let fifo = OpenOptions::new().write(true).open(fifo_path)?;

    let status = Command::new("gunzip")
        .arg("-c")
        .arg(shard_path)
        .stdout(Stdio::from(fifo))
        .stderr(Stdio::piped())
        .status()?;

    if !status.success() {
        return Err(io::Error::other(format!(
            "gunzip exited with status {status}"
        )));
    }
    Ok(())
}
