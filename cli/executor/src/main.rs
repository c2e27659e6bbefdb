//! rb-executor CLI
//!
//! Runs a Rhai snippet over the Arrow batches a host process streams in.

use clap::Parser;
use std::process::ExitCode;

mod args;
mod channel;
mod run;

use args::Cli;

fn main() -> ExitCode {
    let args = Cli::parse();

    // stdout carries IPC data, so logs go to stderr
    if let Err(e) = rb_cli_common::init_logging(args.log_level) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::from(run::launch(&args))
}
