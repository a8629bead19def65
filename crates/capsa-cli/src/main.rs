use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries exactly one JSON object.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = cli::Cli::parse();
    commands::run(cli)
}
