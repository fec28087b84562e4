pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "classroom")]
#[command(about = "Classroom CLI - run the API, sign and inspect init data, create classrooms")]
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
    #[command(about = "Run the HTTP API")]
    Serve,

    #[command(about = "Sign and verify mini-app init data")]
    InitData {
        #[command(subcommand)]
        cmd: commands::init_data::InitDataCommands,
    },

    #[command(about = "Classroom management")]
    Classroom {
        #[command(subcommand)]
        cmd: commands::classroom::ClassroomCommands,
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
        Commands::Serve => commands::serve::handle().await,
        Commands::InitData { cmd } => commands::init_data::handle(cmd, output_format).await,
        Commands::Classroom { cmd } => commands::classroom::handle(cmd, output_format).await,
    }
}
