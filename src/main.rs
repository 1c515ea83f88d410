//! Model Serve - Main Entry Point

use clap::Parser;
use model_serve::cli::{cmd_kinds, cmd_predict, cmd_serve, cmd_train, Cli, Commands};
use model_serve::server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_serve=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, host, models_dir }) => {
            cmd_serve(&host, port, &models_dir).await?;
        }
        Some(Commands::Train { data, target, kind, name, params, models_dir }) => {
            cmd_train(&data, &target, &kind, name, params.as_deref(), &models_dir).await?;
        }
        Some(Commands::Predict { name, data, drop, models_dir, output }) => {
            cmd_predict(&name, &data, drop.as_deref(), &models_dir, output.as_deref()).await?;
        }
        Some(Commands::Kinds) => cmd_kinds(),
        None => {
            let config = ServerConfig::default();
            cmd_serve(&config.host, config.port, &config.models_dir).await?;
        }
    }

    Ok(())
}
