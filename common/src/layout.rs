use std::path::{Path, PathBuf};

/// Naming convention for every file inside a dump's working directory.
/// Pure path arithmetic, no I/O, so it is trivially unit-testable and
/// shared verbatim between the dumper, the restorer and the orchestrator.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Layout {
            root: working_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema_ddl_orig(&self) -> PathBuf {
        self.root.join("schema.ddl.orig")
    }

    pub fn schema_ddl_tokenised(&self) -> PathBuf {
        self.root.join("schema.ddl.tokenised")
    }

    pub fn stage1_ddl(&self) -> PathBuf {
        self.root.join("accel_schema_stage_1.ddl")
    }

    pub fn stage2_ddl(&self, table: &str) -> PathBuf {
        self.root.join("stage_2").join(format!("{table}.ddl"))
    }

    pub fn stage3_ddl(&self, table: &str) -> PathBuf {
        self.root.join("stage_3").join(format!("{table}.ddl"))
    }

    /// `<table>.<NNNNNN>.csv.gz`, ordinal is 1-based: the first shard is
    /// `.000001.csv.gz`.
    pub fn shard(&self, table: &str, ordinal: u64) -> PathBuf {
        self.root
            .join(format!("{table}.{:06}.csv.gz", ordinal))
    }

    pub fn fallback_sql(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.sql.gz"))
    }

    pub fn info(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.info"))
    }

    pub fn key_page(&self, table: &str, ordinal: u64) -> PathBuf {
        self.root
            .join(format!("{table}_keys.{:06}.json", ordinal))
    }

    pub fn fifo(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.fifo"))
    }

    /// Final archive name for `database`, sibling to the working directory.
    pub fn archive_path(parent_dir: &Path, database: &str) -> PathBuf {
        parent_dir.join(format!("{database}.accel.dump"))
    }

    /// Intermediate `.tar` path before the rename to `.accel.dump`.
    pub fn tar_path(parent_dir: &Path, database: &str) -> PathBuf {
        parent_dir.join(format!("{database}.tar"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_ordinal_is_six_digits_zero_padded() {
        let layout = Layout::new("/tmp/work/shop");
        assert_eq!(
            layout.shard("orders", 1),
            PathBuf::from("/tmp/work/shop/orders.000001.csv.gz")
        );
        assert_eq!(
            layout.shard("logs", 250),
            PathBuf::from("/tmp/work/shop/logs.000250.csv.gz")
        );
    }

    #[test]
    fn archive_and_tar_paths_are_siblings_of_the_working_dir() {
        let parent = Path::new("/tmp/work");
        assert_eq!(
            Layout::archive_path(parent, "shop"),
            PathBuf::from("/tmp/work/shop.accel.dump")
        );
        assert_eq!(
            Layout::tar_path(parent, "shop"),
            PathBuf::from("/tmp/work/shop.tar")
        );
    }
}
