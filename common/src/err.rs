use std::io;
use thiserror::Error;

pub type CResult<T> = Result<T, AccelError>;

/// Error taxonomy per the tool's error-handling design: every variant
/// maps to one category in the propagation policy (§7) and carries the
/// table name when the failure is table-scoped.
#[derive(Debug, Error)]
pub enum AccelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not connect to {host}:{port} after {attempts} attempts: {source}")]
    Connect {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: mysql::Error,
    },

    #[error("dump of table `{table}` failed after {attempts} attempts: {source}")]
    TransientDump {
        table: String,
        attempts: u32,
        #[source]
        source: Box<AccelError>,
    },

    #[error("fallback dump of table `{table}` failed after {attempts} attempts: {detail}")]
    FallbackDump {
        table: String,
        attempts: u32,
        detail: String,
    },

    #[error("row count mismatch for table `{table}`: expected {expected}, loaded {actual}")]
    RowCountMismatch {
        table: String,
        expected: u64,
        actual: u64,
    },

    #[error("restore of table `{table}` failed: {detail}")]
    RestoreLoad { table: String, detail: String },

    #[error("schema application failed: {detail}")]
    Schema { detail: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("mysql error: {0}")]
    Mysql(#[from] mysql::Error),
}

impl AccelError {
    pub fn table(&self) -> Option<&str> {
        match self {
            AccelError::TransientDump { table, .. }
            | AccelError::FallbackDump { table, .. }
            | AccelError::RowCountMismatch { table, .. }
            | AccelError::RestoreLoad { table, .. } => Some(table.as_str()),
            _ => None,
        }
    }
}
