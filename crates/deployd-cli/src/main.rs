// deployd CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use deployd_cli::{
    commands::{CheckCommand, RegistryCommand, RunCommand},
    logging,
};

#[derive(Parser)]
#[command(name = "deployd", version)]
#[command(about = "Dispatch source-control events to per-environment deployment actions")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher, reading JSON events from stdin
    Run {
        /// Configuration file (default: ./deployd.yaml or the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Check {
        /// Configuration file (default: ./deployd.yaml or the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the event to action table
    Registry,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config } => RunCommand::new(config).execute().await,
        Commands::Check { config } => CheckCommand::new(config).execute(),
        Commands::Registry => RegistryCommand::new().execute(),
    };

    // No process::exit: abandoned actions must be dropped with the runtime
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
