use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use tracing::info;

use accel_common::config::Config;
use accel_common::err::AccelError;
use accel_common::layout::Layout;
use accel_connection::Session;
use accel_ddl::{rewrite, stage_split};
use accel_dump::TableDumper;
use accel_pool::WorkerPool;
use accel_probe::MetadataProbe;

/// States of the dump state machine. Each variant is entered exactly
/// once, in order; kept as an enum purely so the orchestrator's tracing
/// spans name the stage they belong to.
#[derive(Debug, Clone, Copy)]
enum DumpState {
    Prepare,
    DumpSchema,
    EnumerateTables,
    DumpData,
    Drain,
    Archive,
}

pub fn run(cfg: &Config) -> Result<(), AccelError> {
    let layout = Layout::new(cfg.working_dir());

    enter(DumpState::Prepare);
    fs::create_dir_all(layout.root())?;

    enter(DumpState::DumpSchema);
    dump_schema(cfg, &layout)?;

    enter(DumpState::EnumerateTables);
    let tables = enumerate_tables(cfg)?;
    info!(count = tables.len(), "enumerated tables");

    enter(DumpState::DumpData);
    let pool = WorkerPool::new(cfg.jobs);
    pool.run(&tables, |_worker, table| {
        TableDumper::new(cfg).dump(table).map(|_| ())
    })?;

    enter(DumpState::Drain);
    // std::thread::scope inside WorkerPool::run already joined every
    // worker before returning; nothing further to reap.

    enter(DumpState::Archive);
    archive(cfg, &layout)?;

    Ok(())
}

fn enter(state: DumpState) {
    info!(?state, "entering dump stage");
}

fn dump_schema(cfg: &Config, layout: &Layout) -> Result<(), AccelError> {
    let output = Command::new("mysqldump")
        .arg("--no-data")
        .arg("--routines")
        .arg("--single-transaction=TRUE")
        .arg("-B")
        .arg(format!("--host={}", cfg.host))
        .arg(format!("--port={}", cfg.port))
        .arg(format!("--user={}", cfg.username))
        .env("MYSQL_PWD", &cfg.password)
        .arg(&cfg.database)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(AccelError::Schema {
            detail: format!(
                "mysqldump --no-data exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let orig = String::from_utf8_lossy(&output.stdout).into_owned();
    fs::write(layout.schema_ddl_orig(), &orig)?;

    let cleaned: String = orig
        .lines()
        .map(rewrite::strip_definer)
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = rewrite::strip_alter_database_lines(&cleaned);

    let tokenised = rewrite::tokenise(&cleaned, &cfg.database);
    fs::write(layout.schema_ddl_tokenised(), &tokenised)?;

    let staged = stage_split::split_stages(&cleaned);
    write_stage_output(layout, &staged)?;

    Ok(())
}

fn write_stage_output(layout: &Layout, staged: &stage_split::StageOutput) -> Result<(), AccelError> {
    fs::write(layout.stage1_ddl(), &staged.stage1)?;

    if !staged.stage2.is_empty() {
        fs::create_dir_all(layout.root().join("stage_2"))?;
    }
    for (table, ddl) in &staged.stage2 {
        let mut f = fs::File::create(layout.stage2_ddl(table))?;
        f.write_all(ddl.as_bytes())?;
    }

    if !staged.stage3.is_empty() {
        fs::create_dir_all(layout.root().join("stage_3"))?;
    }
    for (table, ddl) in &staged.stage3 {
        let mut f = fs::File::create(layout.stage3_ddl(table))?;
        f.write_all(ddl.as_bytes())?;
    }

    Ok(())
}

fn enumerate_tables(cfg: &Config) -> Result<Vec<String>, AccelError> {
    let mut session = Session::connect(cfg)?;
    let mut probe = MetadataProbe::new(&mut session, &cfg.database);
    probe.list_base_tables(cfg.tables_string.as_ref())
}

fn archive(cfg: &Config, layout: &Layout) -> Result<(), AccelError> {
    let parent = cfg.directory.as_path();
    let tar_path = Layout::tar_path(parent, &cfg.database);
    let archive_path = Layout::archive_path(parent, &cfg.database);

    let status = Command::new("tar")
        .arg("-cf")
        .arg(&tar_path)
        .arg("-C")
        .arg(parent)
        .arg(&cfg.database)
        .status()?;

    if !status.success() {
        return Err(AccelError::Schema {
            detail: format!("tar exited with status {status}"),
        });
    }

    fs::rename(&tar_path, &archive_path)?;
    fs::remove_dir_all(layout.root())?;

    info!(archive = %archive_path.display(), "dump complete");
    Ok(())
}
