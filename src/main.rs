mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "costlens=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Index {
            path,
            mode,
            scope,
            force_clean,
        } => {
            cli::index(&cli, path, *mode, scope.clone(), *force_clean).await?;
        }
        Commands::Summary => {
            cli::summary(&cli)?;
        }
        Commands::Units { file } => {
            cli::units(&cli, file)?;
        }
        Commands::Detect { file } => {
            cli::detect(&cli, file)?;
        }
    }

    Ok(())
}
