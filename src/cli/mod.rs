pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Campus CLI - Signing, verification and policy tooling for the campus gateway")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sign a JSON payload into a device envelope")]
    Sign(commands::sign::SignArgs),

    #[command(about = "Verify a signed device envelope")]
    Verify(commands::verify::VerifyArgs),

    #[command(about = "Print the canonical form that signatures are computed over")]
    Canonicalize(commands::canonicalize::CanonicalizeArgs),

    #[command(about = "Policy table tooling")]
    Policy {
        #[command(subcommand)]
        cmd: commands::policy::PolicyCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Sign(args) => commands::sign::handle(args, output_format).await,
        Commands::Verify(args) => commands::verify::handle(args, output_format).await,
        Commands::Canonicalize(args) => commands::canonicalize::handle(args, output_format).await,
        Commands::Policy { cmd } => commands::policy::handle(cmd, output_format).await,
    }
}
