use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::process::Command;

use tracing::info;

use accel_common::config::Config;
use accel_common::err::AccelError;
use accel_common::layout::Layout;
use accel_connection::Session;
use accel_ddl::{rewrite, stage_split};
use accel_pool::WorkerPool;
use accel_probe::MetadataProbe;
use accel_restore::{discover_shards, TableRestorer};

#[derive(Debug, Clone, Copy)]
enum RestoreState {
    Unpack,
    Detokenise,
    SplitStages,
    ApplyStage1,
    PostSchemaHook,
    LoadData,
    Barrier,
    ApplyStage2,
    ApplyStage3,
}

pub fn run(cfg: &Config) -> Result<(), AccelError> {
    let file = cfg
        .file
        .as_ref()
        .ok_or_else(|| AccelError::Config("--file is required for restore".into()))?;

    enter(RestoreState::Unpack);
    let source_dir = unpack(file, &cfg.directory)?;
    let layout = Layout::new(source_dir);

    enter(RestoreState::Detokenise);
    let tokenised = fs::read_to_string(layout.schema_ddl_tokenised())?;
    let detokenised = rewrite::detokenise(&tokenised, &cfg.database);

    enter(RestoreState::SplitStages);
    let staged = stage_split::split_stages(&detokenised);
    write_stage_output(&layout, &staged)?;

    if !cfg.skip_create_db {
        enter(RestoreState::ApplyStage1);
        if cfg.accel_keys {
            apply_stage1(cfg, &staged.stage1)?;
        } else {
            apply_full_schema(cfg, &detokenised)?;
        }
    }

    if let Some(cmd) = &cfg.post_schema_command {
        enter(RestoreState::PostSchemaHook);
        run_post_schema_command(cmd)?;
    }

    enter(RestoreState::LoadData);
    let tables = discover_tables(&layout, cfg);
    info!(count = tables.len(), "restoring tables");

    let pool = WorkerPool::new(cfg.jobs);
    pool.run(&tables, |_worker, table| load_table(cfg, &layout, table))?;

    enter(RestoreState::Barrier);

    if cfg.accel_keys {
        enter(RestoreState::ApplyStage2);
        let stage2_tables: Vec<String> = staged.stage2.keys().cloned().collect();
        pool.run(&stage2_tables, |_worker, table| {
            apply_schema_file(cfg, &layout.stage2_ddl(table))
        })?;

        enter(RestoreState::Barrier);

        enter(RestoreState::ApplyStage3);
        let stage3_tables: Vec<String> = staged.stage3.keys().cloned().collect();
        pool.run(&stage3_tables, |_worker, table| {
            apply_schema_file(cfg, &layout.stage3_ddl(table))
        })?;
    }

    Ok(())
}

fn enter(state: RestoreState) {
    info!(?state, "entering restore stage");
}

fn unpack(archive: &std::path::Path, directory: &std::path::Path) -> Result<std::path::PathBuf, AccelError> {
    fs::create_dir_all(directory)?;

    let status = Command::new("tar")
        .arg("-xvf")
        .arg(archive)
        .arg("-C")
        .arg(directory)
        .status()?;

    if !status.success() {
        return Err(AccelError::Schema {
            detail: format!("tar exited with status {status}"),
        });
    }

    let stem = archive
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".accel.dump"))
        .ok_or_else(|| AccelError::Config("archive name must end in .accel.dump".into()))?
        .to_string();

    Ok(directory.join(stem))
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

/// Stage 1 carries `mysqldump -B`'s own `CREATE DATABASE` / `USE`
/// statements, so it must run on a connection with no default schema
/// selected; the target database will not exist yet on a fresh restore.
fn apply_stage1(cfg: &Config, ddl: &str) -> Result<(), AccelError> {
    if ddl.trim().is_empty() {
        return Ok(());
    }

    let mut session = Session::connect_without_database(cfg)?;
    run_statements(&mut session, ddl, "stage1 ddl")
}

/// With `--accel-keys` off there is no split to apply: the full
/// detokenised schema (keys and foreign keys already in place) is
/// created in one shot, the same way `apply_stage1` creates the
/// key-stripped version, and stage-2/stage-3 never run.
fn apply_full_schema(cfg: &Config, ddl: &str) -> Result<(), AccelError> {
    if ddl.trim().is_empty() {
        return Ok(());
    }

    let mut session = Session::connect_without_database(cfg)?;
    run_statements(&mut session, ddl, "full schema ddl")
}

fn apply_schema_file(cfg: &Config, path: &std::path::Path) -> Result<(), AccelError> {
    let ddl = fs::read_to_string(path)?;
    if ddl.trim().is_empty() {
        return Ok(());
    }

    let mut session = Session::connect(cfg)?;
    run_statements(&mut session, &ddl, &format!("{path:?}"))
}

fn run_statements(session: &mut Session, ddl: &str, label: &str) -> Result<(), AccelError> {
    for statement in split_statements(ddl) {
        if statement.trim().is_empty() {
            continue;
        }
        session
            .query_drop(&statement)
            .map_err(|e| AccelError::Schema {
                detail: format!("{label}: {e}"),
            })?;
    }
    Ok(())
}

fn split_statements(ddl: &str) -> Vec<String> {
    ddl.split(";\n")
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn run_post_schema_command(cmd: &str) -> Result<(), AccelError> {
    let output = Command::new("sh").arg("-c").arg(cmd).output()?;
    info!(
        stdout = %String::from_utf8_lossy(&output.stdout),
        stderr = %String::from_utf8_lossy(&output.stderr),
        "post-schema command finished"
    );
    if !output.status.success() {
        return Err(AccelError::Schema {
            detail: format!("post-schema-command exited with {}", output.status),
        });
    }
    Ok(())
}

fn discover_tables(layout: &Layout, cfg: &Config) -> Vec<String> {
    let mut tables = BTreeSet::new();

    if let Ok(entries) = fs::read_dir(layout.root()) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(table) = name.strip_suffix(".sql.gz") {
                tables.insert(table.to_string());
            } else if name.ends_with(".csv.gz") {
                if let Some(table) = name.split('.').next() {
                    tables.insert(table.to_string());
                }
            }
        }
    }

    tables.retain(|t| cfg.wants_table(t));
    tables.into_iter().collect()
}

fn load_table(cfg: &Config, layout: &Layout, table: &str) -> Result<(), AccelError> {
    let (kind, shards) = discover_shards(layout, table);

    let mut probe_session = Session::connect(cfg)?;
    let cols = MetadataProbe::new(&mut probe_session, &cfg.database).get_column_types(table)?;

    let expected = if cfg.check_count {
        let info_path = layout.info(table);
        fs::read_to_string(&info_path)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .and_then(|v| v.get("record_count").and_then(|c| c.as_u64()))
    } else {
        None
    };

    let restorer = TableRestorer::new(cfg, layout.clone());
    restorer.restore(table, kind, &shards, &cols, expected)?;
    Ok(())
}
