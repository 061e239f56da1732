//! ## grindvakt-cli
//! **Operator interface to the packet filter**
//!
//! `serve` runs the engine and its control socket; `add` and `flush` talk to
//! a running engine over that socket; `replay` runs a scenario offline.

use anyhow::Context;
use clap::Parser;

mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let name = cli.command.name();
    commands::run_command(cli)
        .await
        .with_context(|| format!("grindvakt {name} failed"))
}
