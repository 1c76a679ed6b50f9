use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use tracing::warn;

use accel_codec::CompressedWriter;
use accel_common::config::Config;
use accel_common::err::AccelError;
use accel_common::layout::Layout;

use crate::table_dumper::DumpOutcome;

const MAX_ATTEMPTS: u32 = 20;

/// Shells out to the vendor dumper for BLOB/TEXT-bearing tables that
/// cannot safely be paged through the streaming path.
pub fn dump(cfg: &Config, layout: &Layout, table: &str) -> Result<DumpOutcome, AccelError> {
    let mut last_err = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match dump_once(cfg, layout, table) {
            Ok(()) => {
                return Ok(DumpOutcome {
                    table: table.to_string(),
                    rows_written: 0,
                    shard_count: 0,
                    via_fallback: true,
                })
            }
            Err(e) => {
                warn!(table, attempt, "fallback dump attempt failed: {e}");
                last_err = Some(e.to_string());
            }
        }
    }

    Err(AccelError::FallbackDump {
        table: table.to_string(),
        attempts: MAX_ATTEMPTS,
        detail: last_err.unwrap_or_default(),
    })
}

fn dump_once(cfg: &Config, layout: &Layout, table: &str) -> io::Result<()> {
    let path = layout.fallback_sql(table);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut child = Command::new("mysqldump")
        .arg("--no-create-info")
        .arg("--skip-triggers")
        .arg("--single-transaction=TRUE")
        .arg("--max_allowed_packet=2G")
        .arg(format!("--host={}", cfg.host))
        .arg(format!("--port={}", cfg.port))
        .arg(format!("--user={}", cfg.username))
        .env("MYSQL_PWD", &cfg.password)
        .arg(&cfg.database)
        .arg(table)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut writer = CompressedWriter::create(&path)?;
    io::copy(&mut stdout, &mut writer)?;
    writer.finish()?;

    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    let status = child.wait()?;
    if !status.success() || !stderr.is_empty() {
        return Err(io::Error::other(format!(
            "mysqldump exited with status {status}: {stderr}"
        )));
    }

    Ok(())
}
