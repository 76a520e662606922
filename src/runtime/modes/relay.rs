//! Relay mode
//!
//! Runs the standalone relay bot: long polling plus lookups against the
//! main API. No database, no HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::get_config;
use crate::runtime::lifetime;
use crate::telegram::relay::relay_commands;
use crate::telegram::{BotApi, Poller, RelayHandler, TelegramApi, test_connection};

pub async fn run_relay() -> Result<()> {
    let config = get_config();
    if !config.telegram.enabled() {
        bail!("telegram.bot_token (TELEGRAM_BOT_TOKEN) is required for the relay bot");
    }
    if config.api.internal_token.is_empty() {
        warn!("api.internal_token is empty; lookups will fail if the main API requires it");
    }

    let api: Arc<dyn TelegramApi> = Arc::new(
        BotApi::from_config(&config.telegram).context("Failed to create Telegram client")?,
    );
    let handler = Arc::new(
        RelayHandler::new(api.clone(), &config.relay, config.api.internal_token.clone())
            .context("Failed to create relay handler")?,
    );

    let report = test_connection(api.as_ref(), None).await;
    if !report.connected {
        bail!(
            "Telegram connection failed: {}",
            report.error.unwrap_or_default()
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(
        api,
        handler,
        relay_commands(),
        config.telegram.poll_timeout_secs,
        Duration::from_secs(config.telegram.retry_delay_secs),
    )
    .spawn(shutdown_rx);

    info!("Relay bot running");
    lifetime::shutdown::listen_for_shutdown(shutdown_tx, vec![poller]).await;
    Ok(())
}
