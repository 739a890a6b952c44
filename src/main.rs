mod cli;
mod replay;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use keyrate::TrackerError;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::replay::run_replay;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Replay(replay)) => run_replay(replay),
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
    // 2: malformed event, 3: strict rejection, 4: input I/O failure, 1: other
    for cause in err.chain() {
        if cause.is::<TrackerError>() {
            return 3;
        }
        if let Some(je) = cause.downcast_ref::<serde_json::Error>() {
            return if je.is_io() { 4 } else { 2 };
        }
        if cause.is::<std::io::Error>() {
            return 4;
        }
    }
    1
}
