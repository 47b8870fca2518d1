//! `warmline serve` — Start the HTTP gateway server.

use anyhow::Context;
use warmline_config::AppConfig;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    warmline_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
