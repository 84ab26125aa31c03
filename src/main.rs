mod bot;
mod commands;
mod config;
mod llm;
mod remover;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,codebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Pick up a local .env if present; deployments set the environment directly.
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  Model: {}", config.groq.model);
    info!("  Groq API key: {}", config::mask_secret(&config.groq.api_key));
    info!("  Background removal endpoint: {}", config.rembg.endpoint);

    let state = Arc::new(AppState::new(config));

    info!("Bot is starting...");
    bot::run(state).await?;

    Ok(())
}
