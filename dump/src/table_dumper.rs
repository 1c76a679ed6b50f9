use std::fs;
use std::io::Write;

use tracing::{info, warn};

use accel_codec::CompressedWriter;
use accel_common::config::Config;
use accel_common::err::AccelError;
use accel_common::layout::Layout;
use accel_common::pretty::count_pretty;
use accel_connection::Session;
use accel_probe::{derive_export_expressions, ColumnInfo, MetadataProbe};

use crate::csv_dialect::{format_header, format_row};
use crate::fallback;

const MAX_ATTEMPTS: u32 = 5;
const FETCH_PAGE_SIZE: u64 = 10_000;
const SHARD_ROW_LIMIT: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOutcome {
    pub table: String,
    pub rows_written: u64,
    pub shard_count: u64,
    pub via_fallback: bool,
}

/// Streams a single table into one or more `.csv.gz` shards.
/// BLOB/TEXT-bearing tables are routed to the fallback exporter before
/// any shard is opened.
pub struct TableDumper<'a> {
    cfg: &'a Config,
    layout: Layout,
}

impl<'a> TableDumper<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        TableDumper {
            cfg,
            layout: Layout::new(cfg.working_dir()),
        }
    }

    pub fn dump(&self, table: &str) -> Result<DumpOutcome, AccelError> {
        if self.cfg.is_fallback_table(table) {
            let outcome = fallback::dump(self.cfg, &self.layout, table)?;
            return Ok(outcome);
        }

        let mut probe_session = Session::connect(self.cfg)?;
        let cols = MetadataProbe::new(&mut probe_session, &self.cfg.database)
            .get_column_types(table)?;
        let export = derive_export_expressions(&cols);

        if export.paging_required {
            return fallback::dump(self.cfg, &self.layout, table);
        }

        let expected_rows = if self.cfg.check_count {
            let count = MetadataProbe::new(&mut probe_session, &self.cfg.database)
                .get_row_count(table)?;
            write_info_file(&self.layout, table, count)?;
            Some(count)
        } else {
            None
        };

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.dump_once(table, &cols, &export.expressions, expected_rows) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!(table, attempt, "dump attempt failed: {e}");
                    delete_shards(&self.layout, table);
                    last_err = Some(e);
                }
            }
        }

        Err(AccelError::TransientDump {
            table: table.to_string(),
            attempts: MAX_ATTEMPTS,
            source: Box::new(last_err.expect("loop runs at least once")),
        })
    }

    fn dump_once(
        &self,
        table: &str,
        cols: &[ColumnInfo],
        expressions: &[String],
        expected_rows: Option<u64>,
    ) -> Result<DumpOutcome, AccelError> {
        let mut session = Session::connect(self.cfg)?;

        let sql = self.select_sql(table, expressions);
        let column_names: Vec<String> = cols.iter().map(|c| c.name.clone()).collect();

        let mut shard: Option<ShardWriter> = None;
        let mut total_rows: u64 = 0;
        let mut next_ordinal: u64 = 1;
        let mut page_counter: u64 = 0;

        {
            let result = session.query_iter(&sql)?;
            for row in result {
                let row = row.map_err(AccelError::from)?;
                let values = row_to_values(row, cols.len());

                if shard.is_none() {
                    let writer = ShardWriter::open(&self.layout, table, next_ordinal)?;
                    next_ordinal += 1;
                    shard = Some(writer);
                    shard
                        .as_mut()
                        .unwrap()
                        .write_header(&column_names)?;
                }

                shard.as_mut().unwrap().write_row(&values)?;
                total_rows += 1;
                page_counter += 1;

                if page_counter >= FETCH_PAGE_SIZE {
                    page_counter = 0;
                    info!(table, rows = count_pretty(total_rows), "fetch progress");
                }

                if total_rows % SHARD_ROW_LIMIT == 0 {
                    shard.take().unwrap().finish()?;
                }
            }
        }

        if let Some(s) = shard.take() {
            s.finish()?;
        }

        info!(table, rows = count_pretty(total_rows), "dump complete");

        if let Some(expected) = expected_rows {
            if expected != total_rows {
                return Err(AccelError::RowCountMismatch {
                    table: table.to_string(),
                    expected,
                    actual: total_rows,
                });
            }
        }

        Ok(DumpOutcome {
            table: table.to_string(),
            rows_written: total_rows,
            shard_count: next_ordinal - 1,
            via_fallback: false,
        })
    }

    fn select_sql(&self, table: &str, expressions: &[String]) -> String {
        let mut sql = format!("SELECT {} FROM `{}`", expressions.join(", "), table);
        if let Some(limit) = self.cfg.sample {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn test_cfg(sample: Option<u64>) -> Config {
        Config {
            host: "localhost".into(),
            port: 3306,
            username: "root".into(),
            password: String::new(),
            database: "shop".into(),
            action: accel_common::config::Action::Dump,
            jobs: 1,
            directory: PathBuf::from("/tmp"),
            file: None,
            sample,
            check_count: false,
            fallback_tables: BTreeSet::new(),
            tables_string: None,
            page_size: 1000,
            accel_keys: false,
            skip_create_db: false,
            post_schema_command: None,
        }
    }

    #[test]
    fn select_sql_without_sample_has_no_limit() {
        let cfg = test_cfg(None);
        let dumper = TableDumper::new(&cfg);
        let sql = dumper.select_sql("orders", &["`id`".to_string(), "`total`".to_string()]);
        assert_eq!(sql, "SELECT `id`, `total` FROM `orders`");
    }

    #[test]
    fn select_sql_with_sample_appends_limit() {
        let cfg = test_cfg(Some(500));
        let dumper = TableDumper::new(&cfg);
        let sql = dumper.select_sql("orders", &["`id`".to_string()]);
        assert_eq!(sql, "SELECT `id` FROM `orders` LIMIT 500");
    }

    #[test]
    fn write_and_delete_shards_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = Layout::new(dir.path());

        write_info_file(&layout, "orders", 42).expect("write info");
        let body = fs::read_to_string(layout.info("orders")).expect("read info");
        assert!(body.contains("42"));

        fs::write(layout.shard("orders", 1), b"dummy").expect("write shard");
        fs::write(layout.shard("orders", 2), b"dummy").expect("write shard");
        assert!(layout.shard("orders", 1).exists());

        delete_shards(&layout, "orders");
        assert!(!layout.shard("orders", 1).exists());
        assert!(!layout.shard("orders", 2).exists());
    }
}

struct ShardWriter {
    inner: CompressedWriter,
}

impl ShardWriter {
    fn open(layout: &Layout, table: &str, ordinal: u64) -> Result<Self, AccelError> {
        let path = layout.shard(table, ordinal);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(ShardWriter {
            inner: CompressedWriter::create(&path)?,
        })
    }

    fn write_header(&mut self, columns: &[String]) -> Result<(), AccelError> {
        self.inner
            .write_all(format_header(columns).as_bytes())
            .map_err(AccelError::from)
    }

    fn write_row(&mut self, values: &[Option<String>]) -> Result<(), AccelError> {
        self.inner
            .write_all(format_row(values).as_bytes())
            .map_err(AccelError::from)
    }

    fn finish(self) -> Result<(), AccelError> {
        self.inner.finish().map_err(AccelError::from)
    }
}

fn row_to_values(row: mysql::Row, column_count: usize) -> Vec<Option<String>> {
    let mut values = Vec::with_capacity(column_count);
    for i in 0..column_count {
        let value: Option<String> = row.get::<Option<String>, usize>(i).flatten();
        values.push(value);
    }
    values
}

fn write_info_file(layout: &Layout, table: &str, record_count: u64) -> Result<(), AccelError> {
    let path = layout.info(table);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::json!({ "record_count": record_count });
    fs::write(path, serde_json::to_vec(&body).map_err(|e| AccelError::Config(e.to_string()))?)?;
    Ok(())
}

fn delete_shards(layout: &Layout, table: &str) {
    for ordinal in 1.. {
        let path = layout.shard(table, ordinal);
        if !path.exists() {
            break;
        }
        let _ = fs::remove_file(path);
    }
}
