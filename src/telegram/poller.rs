//! Long-polling update loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::TelegramApi;
use super::handler::UpdateHandler;
use super::types::BotCommand;

pub struct Poller {
    api: Arc<dyn TelegramApi>,
    handler: Arc<dyn UpdateHandler>,
    commands: Vec<BotCommand>,
    timeout_secs: u64,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        handler: Arc<dyn UpdateHandler>,
        commands: Vec<BotCommand>,
        timeout_secs: u64,
        retry_delay: Duration,
    ) -> Self {
        Self {
            api,
            handler,
            commands,
            timeout_secs,
            retry_delay,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Poll until `shutdown` flips to true. Updates are handled one at a
    /// time, in order.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // getUpdates is refused while a webhook is set
        if let Err(e) = self.api.delete_webhook().await {
            warn!("Failed to delete webhook before polling: {}", e);
        }
        if let Err(e) = self.api.set_my_commands(&self.commands).await {
            warn!("Failed to register bot commands: {}", e);
        }
        info!("Telegram polling started");

        let mut offset = 0i64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                batch = self.api.get_updates(offset, self.timeout_secs) => batch,
                _ = shutdown.changed() => break,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let update_id = update.update_id;
                        if let Err(e) = self.handler.handle(update).await {
                            error!("Failed to handle update {}: {}", update_id, e);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Polling failed: {}. Retrying in {}s",
                        e,
                        self.retry_delay.as_secs()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        debug!("Telegram polling stopped at offset {}", offset);
        info!("Telegram polling stopped");
    }
}
