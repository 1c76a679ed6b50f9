use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::info;

use accel_codec::decompress_to_path;
use accel_common::config::Config;
use accel_common::err::AccelError;
use accel_common::layout::Layout;
use accel_connection::Session;
use accel_probe::{derive_import_expressions, ColumnInfo};

use crate::fifo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardKind {
    Csv,
    Fallback,
}

/// Discovers a table's shards on disk: a single `.sql.gz` fallback dump,
/// or the ordered list of `.csv.gz` shards. The two are mutually
/// exclusive.
pub fn discover_shards(layout: &Layout, table: &str) -> (ShardKind, Vec<PathBuf>) {
    let fallback = layout.fallback_sql(table);
    if fallback.exists() {
        return (ShardKind::Fallback, vec![fallback]);
    }

    let prefix = format!("{table}.");
    let mut shards: Vec<(u64, PathBuf)> = Vec::new();

    if let Ok(entries) = fs::read_dir(layout.root()) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix(&prefix) {
                if let Some(ordinal_str) = rest.strip_suffix(".csv.gz") {
                    if let Ok(ordinal) = ordinal_str.parse::<u64>() {
                        shards.push((ordinal, entry.path()));
                    }
                }
            }
        }
    }

    shards.sort_by_key(|(ordinal, _)| *ordinal);
    (ShardKind::Csv, shards.into_iter().map(|(_, p)| p).collect())
}

/// Loads a single table from its ordered shards: one FIFO +
/// decompression worker per shard, loaded strictly in order.
pub struct TableRestorer<'a> {
    cfg: &'a Config,
    layout: Layout,
}

impl<'a> TableRestorer<'a> {
    /// `layout` addresses the directory a dump archive was unpacked into,
    /// which need not match `cfg.working_dir()` when restoring into a
    /// database named differently from the one that was dumped.
    pub fn new(cfg: &'a Config, layout: Layout) -> Self {
        TableRestorer { cfg, layout }
    }

    pub fn restore(
        &self,
        table: &str,
        kind: ShardKind,
        shards: &[PathBuf],
        cols: &[ColumnInfo],
        expected: Option<u64>,
    ) -> Result<u64, AccelError> {
        let mut total_records: u64 = 0;
        let fifo_path = self.layout.fifo(table);

        for (idx, shard) in shards.iter().enumerate() {
            fifo::create(&fifo_path)?;
            let decompressor = decompress_to_path(shard, &fifo_path);

            let records = match kind {
                ShardKind::Csv => self.load_csv_shard(table, &fifo_path, cols)?,
                ShardKind::Fallback => self.load_fallback_shard(&fifo_path)?,
            };
            total_records += records;

            decompressor
                .join()
                .map_err(|_| AccelError::RestoreLoad {
                    table: table.to_string(),
                    detail: "decompression worker panicked".to_string(),
                })?
                .map_err(|e| AccelError::RestoreLoad {
                    table: table.to_string(),
                    detail: e.to_string(),
                })?;

            info!(table, shard = idx, records, "shard loaded");
        }

        if let Some(expected) = expected {
            if expected != total_records {
                return Err(AccelError::RowCountMismatch {
                    table: table.to_string(),
                    expected,
                    actual: total_records,
                });
            }
        }

        Ok(total_records)
    }

    fn load_csv_shard(
        &self,
        table: &str,
        fifo_path: &std::path::Path,
        cols: &[ColumnInfo],
    ) -> Result<u64, AccelError> {
        let mut session = Session::connect_allowing_local_infile(self.cfg, fifo_path)?;
        session.disable_key_checks()?;

        let import = derive_import_expressions(cols);
        let set_clause = if import.set_clauses.is_empty() {
            String::new()
        } else {
            format!(" SET {}", import.set_clauses.join(", "))
        };

        let sql = format!(
            "LOAD DATA LOCAL INFILE '{}' INTO TABLE `{}` \
             CHARACTER SET utf8 \
             COLUMNS TERMINATED BY ',' OPTIONALLY ENCLOSED BY '\"' \
             IGNORE 1 ROWS ({}){}",
            fifo_path.display(),
            table,
            import.columns.join(", "),
            set_clause
        );

        session.query_drop(&sql)?;
        Ok(session.affected_rows())
    }

    fn load_fallback_shard(&self, fifo_path: &std::path::Path) -> Result<u64, AccelError> {
        let fifo_file = fs::File::open(fifo_path)?;

        let status = Command::new("mysql")
            .arg(format!("--host={}", self.cfg.host))
            .arg(format!("--port={}", self.cfg.port))
            .arg(format!("--user={}", self.cfg.username))
            .env("MYSQL_PWD", &self.cfg.password)
            .arg(&self.cfg.database)
            .stdin(Stdio::from(fifo_file))
            .stderr(Stdio::piped())
            .status()?;

        if !status.success() {
            return Err(AccelError::RestoreLoad {
                table: self.cfg.database.clone(),
                detail: format!("mysql client exited with {status}"),
            });
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_shard_wins_over_csv_shards() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());

        fs::write(layout.fallback_sql("orders"), b"dummy").expect("write fallback");
        fs::write(layout.shard("orders", 1), b"dummy").expect("write shard");

        let (kind, shards) = discover_shards(&layout, "orders");
        assert_eq!(kind, ShardKind::Fallback);
        assert_eq!(shards, vec![layout.fallback_sql("orders")]);
    }

    #[test]
    fn csv_shards_are_discovered_in_ordinal_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());

        fs::write(layout.shard("orders", 2), b"dummy").expect("write shard 2");
        fs::write(layout.shard("orders", 1), b"dummy").expect("write shard 1");
        fs::write(layout.shard("orders", 10), b"dummy").expect("write shard 10");

        let (kind, shards) = discover_shards(&layout, "orders");
        assert_eq!(kind, ShardKind::Csv);
        assert_eq!(
            shards,
            vec![
                layout.shard("orders", 1),
                layout.shard("orders", 2),
                layout.shard("orders", 10),
            ]
        );
    }

    #[test]
    fn unrelated_table_shards_are_not_matched_by_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());

        fs::write(layout.shard("orders", 1), b"dummy").expect("write shard");
        fs::write(layout.shard("orders_archive", 1), b"dummy").expect("write shard");

        let (_, shards) = discover_shards(&layout, "orders");
        assert_eq!(shards, vec![layout.shard("orders", 1)]);
    }
}
