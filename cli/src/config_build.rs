use std::collections::BTreeSet;
use std::env;

use accel_common::config::{Action, Config};
use accel_common::err::AccelError;

use crate::cli_args::{ActionArg, CliArgs};

/// Resolves parsed CLI flags into the explicit [`Config`] record threaded
/// through the rest of the tool.
pub fn build_config(args: CliArgs) -> Result<Config, AccelError> {
    let action = match args.action {
        ActionArg::Dump => Action::Dump,
        ActionArg::Restore => Action::Restore,
    };

    let password = args
        .password
        .or_else(|| env::var("MYSQL_PWD").ok())
        .ok_or_else(|| AccelError::Config("no --password given and MYSQL_PWD is unset".into()))?;

    if action == Action::Restore && args.file.is_none() {
        return Err(AccelError::Config(
            "--file is required for --action restore".into(),
        ));
    }

    Ok(Config {
        host: args.host,
        port: args.port,
        username: args.username,
        password,
        database: args.database,
        action,
        jobs: args.jobs,
        directory: args.directory,
        file: args.file,
        sample: args.sample,
        check_count: args.check_count,
        fallback_tables: args.fallback_tables.into_iter().collect::<BTreeSet<_>>(),
        tables_string: args
            .tables_string
            .map(|tables| tables.into_iter().collect::<BTreeSet<_>>()),
        page_size: args.page_size,
        accel_keys: args.accel_keys,
        skip_create_db: args.skip_create_db,
        post_schema_command: args.post_schema_command,
    })
}
