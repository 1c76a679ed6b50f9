use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::debug;

/// Gzip compression pipeline: bytes written here go into `gzip`'s stdin,
/// whose stdout is redirected straight into the target file. Used to
/// produce `.csv.gz` / `.sql.gz` shards without buffering the whole
/// shard in process memory.
pub struct CompressedWriter {
    child: Child,
    stdin: ChildStdin,
}

impl CompressedWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let out_file = File::create(path)?;
        debug!(path = %path.display(), "opening gzip pipe");

        let mut child = Command::new("gzip")
            .arg("-c")
            .stdin(Stdio::piped())
            .stdout(Stdio::from(out_file))
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin was piped");

        Ok(CompressedWriter { child, stdin })
    }

    /// Closes the pipe and waits for `gzip` to exit. Must be called
    /// explicitly (rather than relying on `Drop`) so a non-zero exit can
    /// be surfaced as an error to the caller's retry loop.
    pub fn finish(mut self) -> io::Result<()> {
        drop(self.stdin);
        let status = self.child.wait()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "gzip exited with status {status}"
            )));
        }
        Ok(())
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdin.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdin.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    #[test]
    fn round_trips_through_gzip_and_gunzip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shard.csv.gz");

        let mut writer = CompressedWriter::create(&path).expect("create");
        writer.write_all(b"id,name\n1,alice\n").expect("write");
        writer.finish().expect("finish");

        let output = StdCommand::new("gunzip")
            .arg("-c")
            .arg(&path)
            .output()
            .expect("gunzip");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"id,name\n1,alice\n");
    }
}
