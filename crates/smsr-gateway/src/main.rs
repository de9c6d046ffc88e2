use std::sync::Arc;

use smsr_core::telegram::TelegramChannel;
use smsr_gateway::config::GatewayConfig;
use smsr_gateway::GatewayServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = if let Ok(path) = std::env::var("SMSR_CONFIG_PATH") {
        GatewayConfig::from_toml(path)?
    } else {
        GatewayConfig::from_env()?
    };

    let telegram = Arc::new(TelegramChannel::new(&config.bot_token, &config.telegram_api_base)?);
    let shutdown_timeout = config.shutdown_timeout();
    let id_responder = config.id_responder;

    let server = GatewayServer::new(config, telegram.clone())?;
    let responder = id_responder.then(|| server.spawn_id_responder(telegram));

    server.start().await?;

    if let Some(responder) = responder {
        if tokio::time::timeout(shutdown_timeout, responder).await.is_err() {
            warn!("ID responder did not stop within {:?}", shutdown_timeout);
        }
    }
    info!("smsr-gateway stopped");

    Ok(())
}
