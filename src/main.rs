mod cli;

use clap::Parser;
use cli::{Cli, Command};
use lectro::embedding::OpenAiEmbedder;
use lectro::server::{self, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let embedder = OpenAiEmbedder::new(&cli.config.embedding).map_err(std::io::Error::other)?;
            let state = AppState::new(cli.config.store(), Arc::new(embedder));
            server::serve(&bind, state).await?;
        }
        command => {
            if let Err(e) = cli::execute(&cli.config, command) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
