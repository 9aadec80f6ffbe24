mod commands;
mod config;
mod context;
mod convert;
mod generate;
mod output;
mod postprocessing;
mod registry;
mod syntax;
mod traits;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::GenerateCommand;
use context::Context;

#[derive(Parser)]
#[command(name = "tfgen")]
#[command(about = "Generate Terraform configuration from existing Grafana and Grafana Cloud resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover resources and write import blocks and configuration for them
    Generate(GenerateCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::new();

    match cli.command {
        Commands::Generate(command) => command.execute(&ctx)?,
    }

    Ok(())
}
