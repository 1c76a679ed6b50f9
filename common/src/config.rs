use std::collections::BTreeSet;
use std::path::PathBuf;

/// The action requested on the CLI (`--action dump|restore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Dump,
    Restore,
}

/// Fully resolved run configuration, threaded by value through the
/// orchestrator and every worker it spawns. Replaces the process-global
/// configuration the original tool relied on: every component here takes
/// its own `Config` rather than reaching for ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub action: Action,

    pub jobs: usize,
    pub directory: PathBuf,
    pub file: Option<PathBuf>,

    pub sample: Option<u64>,
    pub check_count: bool,

    pub fallback_tables: BTreeSet<String>,
    pub tables_string: Option<BTreeSet<String>>,

    pub page_size: u64,
    pub accel_keys: bool,
    pub skip_create_db: bool,
    pub post_schema_command: Option<String>,
}

impl Config {
    /// Working directory for this run: `<directory>/<database>`.
    ///
    /// Always appends the database name rather than treating `--directory`
    /// as the literal dump root: it is the only choice under which two
    /// databases can be dumped into the same `--directory` without
    /// colliding.
    pub fn working_dir(&self) -> PathBuf {
        self.directory.join(&self.database)
    }

    pub fn wants_table(&self, table: &str) -> bool {
        match &self.tables_string {
            Some(set) => set.contains(table),
            None => true,
        }
    }

    pub fn is_fallback_table(&self, table: &str) -> bool {
        self.fallback_tables.contains(table)
    }
}
