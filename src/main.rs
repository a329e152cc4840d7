mod aggregate;
mod align;
mod analyze;
mod catalog;
mod cli;
mod error;
mod metrics;
mod model;
mod origin;
mod pipeline;
mod record;
mod report;
mod scaling;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::analyze::{run_analyze, Mode};
use crate::cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Series(args)) => run_analyze(Mode::Series, args),
        Some(Commands::Aggregate(args)) => run_analyze(Mode::Aggregate, args),
        Some(Commands::Scaling(args)) => run_analyze(Mode::Scaling, args),
        Some(Commands::View(args)) => run_analyze(Mode::View, args),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        // Map to stable exit codes
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: unusable input set, 3: missing start timestamp, 4: I/O failure, 1: other
    for cause in err.chain() {
        if cause.is::<crate::record::InputError>() {
            return 2;
        }
        if let Some(align) = cause.downcast_ref::<crate::error::AlignError>() {
            return match align {
                crate::error::AlignError::MissingTimestamp { .. } => 3,
                crate::error::AlignError::GridMismatch { .. } => 1,
            };
        }
        if cause.is::<std::io::Error>() {
            return 4;
        }
    }
    1
}
