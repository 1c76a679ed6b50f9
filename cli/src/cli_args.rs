use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line surface for dumping and restoring a database.
#[derive(Parser, Debug, Clone)]
#[command(name = "accel-dump")]
#[command(version)]
#[command(about = "Parallel dump/restore engine for a MySQL-compatible database")]
pub struct CliArgs {
    #[arg(long, default_value = "localhost")]
    pub host: String,

    #[arg(long, default_value_t = 3306)]
    pub port: u16,

    #[arg(long)]
    pub username: String,

    /// Optional; if absent, taken from `MYSQL_PWD`.
    #[arg(long)]
    pub password: Option<String>,

    #[arg(long)]
    pub database: String,

    #[arg(long, value_enum)]
    pub action: ActionArg,

    #[arg(long, default_value_t = 4)]
    pub jobs: usize,

    #[arg(long, default_value = "/tmp")]
    pub directory: PathBuf,

    /// Archive to restore; required for `--action restore`.
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub sample: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub check_count: bool,

    #[arg(long, value_delimiter = ',')]
    pub fallback_tables: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub tables_string: Option<Vec<String>>,

    #[arg(long, default_value_t = 1000)]
    pub page_size: u64,

    #[arg(long, default_value_t = false)]
    pub accel_keys: bool,

    #[arg(long, default_value_t = false)]
    pub skip_create_db: bool,

    #[arg(long)]
    pub post_schema_command: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionArg {
    Dump,
    Restore,
}
