use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod check;
mod models;
mod replay;
mod setup;
mod submit;

#[derive(Parser)]
#[command(name = "livecheck", version, about = "Face liveness verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a liveness session against a recorded landmark stream
    Check(check::Args),
    /// Submit an identity verification with a captured selfie
    Submit(submit::Args),
    /// Verify the landmark model assets against their manifest
    Models {
        /// Model directory (default: $LIVECHECK_MODEL_DIR or the XDG data dir)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Download missing landmark model assets listed in the manifest
    Setup {
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = livecheck_session::Config::from_env();

    match cli.command {
        Command::Check(args) => check::run(args, &config).await,
        Command::Submit(args) => submit::run(args, &config).await,
        Command::Models { model_dir } => {
            models::run(&model_dir.unwrap_or_else(|| config.model_dir.clone()))
        }
        Command::Setup { model_dir } => {
            let dir = model_dir.unwrap_or_else(|| config.model_dir.clone());
            tokio::task::spawn_blocking(move || setup::run(&dir)).await?
        }
    }
}
