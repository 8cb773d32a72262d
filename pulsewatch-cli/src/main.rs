//! Pulsewatch CLI - Command-line interface
//!
//! This binary provides a command-line interface to the pulsewatch library.

mod commands;
mod error;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pulsewatch")]
#[command(version = pulsewatch::VERSION)]
#[command(about = "Liveness probing and listener state tracking", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a heartbeat probe session and report the final status
    Probe(commands::probe::ProbeArgs),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let result = match args.command {
        Command::Probe(probe_args) => commands::probe::run(probe_args).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
