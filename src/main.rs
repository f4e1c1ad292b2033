use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;
mod domain;
mod services;

pub use cli::*;
pub use commands::*;
pub use domain::{
    constants::*, decision::*, errors::*, inputs::*, mapping::*, progress::*, report::*,
    schema_version::*, vocab::*,
};
pub use services::{
    applier::*, batching::*, config::*, mapping_init::*, merger::*, migration::*, output::*,
    progress::*, recorder::*, report_builder::*, reset::*, schema_check::*, storage::*,
    validation::*,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("STDMAP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let ws = Workspace::open(&cli.root, cli.standard.as_deref())?;
    if handle_admin_commands(cli, &ws)? {
        return Ok(());
    }
    handle_workflow_commands(cli, &ws)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(cli.json, &err);
            ExitCode::FAILURE
        }
    }
}
