mod cli_args;
mod config_build;
mod orchestrator;

use clap::Parser;
use tracing::error;

use accel_common::config::Action;
use cli_args::CliArgs;

fn main() {
    let args = CliArgs::parse();
    accel_common::logging::init(false);

    let cfg = match config_build::build_config(args) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    let result = match cfg.action {
        Action::Dump => orchestrator::dump::run(&cfg),
        Action::Restore => orchestrator::restore::run(&cfg),
    };

    if let Err(e) = result {
        error!(table = e.table(), "{e}");
        std::process::exit(1);
    }
}
