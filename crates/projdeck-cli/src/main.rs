use std::path::PathBuf;

use clap::{Parser, Subcommand};
use projdeck_cli::cli::{resolve_config, run_command, CliCommand, CliOverrides};
use projdeck_core::tracing_setup::init_tracing;

#[derive(Parser)]
#[command(name = "projdeck-cli")]
#[command(about = "Session and live notifications for the project-management API")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (contains dataDir, apiBaseUrl)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory holding the stored credential
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base URL of the REST API
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an access token and show the role it carries
    Login {
        /// JWT issued by the API
        token: String,
    },

    /// Forget the stored access token
    Logout,

    /// Fetch the profile for the stored token
    Whoami,

    /// Stream live notifications until Ctrl-C
    Watch,

    /// Mark one notification as read
    Read {
        /// Notification ID
        id: i64,
    },

    /// Mark every notification as read
    ReadAll,

    /// Delete one notification
    Delete {
        /// Notification ID
        id: i64,
    },
}

#[tokio::main]
async fn main() {
    init_tracing("warn");
    let cli = Cli::parse();

    let overrides = CliOverrides {
        config: cli.config,
        data_dir: cli.data_dir,
        api_url: cli.api_url,
    };
    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let command = match cli.command {
        Commands::Login { token } => CliCommand::Login { token },
        Commands::Logout => CliCommand::Logout,
        Commands::Whoami => CliCommand::Whoami,
        Commands::Watch => CliCommand::Watch,
        Commands::Read { id } => CliCommand::Read { id },
        Commands::ReadAll => CliCommand::ReadAll,
        Commands::Delete { id } => CliCommand::Delete { id },
    };

    if let Err(e) = run_command(config, command, cli.pretty).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
