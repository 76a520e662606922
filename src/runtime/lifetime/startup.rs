use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiState, JwtService, TelegramState};
use crate::config::{StaticConfig, TelegramMode, get_config};
use crate::scheduler;
use crate::services::AppServices;
use crate::storage::{SeaOrmStorage, StorageFactory};
use crate::telegram::commands::bot_commands;
use crate::telegram::{
    BotApi, BotHandler, BroadcastQueue, ChannelBroadcaster, ChatId, NoopBroadcaster,
    NotificationOutbox, Poller, TelegramApi, TelegramBroadcaster, UpdateHandler, test_connection,
};

/// 频道广播队列容量
const BROADCAST_QUEUE_CAPACITY: usize = 256;

pub struct StartupContext {
    pub config: Arc<StaticConfig>,
    pub storage: Arc<SeaOrmStorage>,
    pub services: AppServices,
    pub api_state: ApiState,
    /// Flipped to `true` once to stop every background task
    pub shutdown_tx: watch::Sender<bool>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Bot client and channel target, when a bot token is configured
struct TelegramClient {
    api: Arc<dyn TelegramApi>,
    channel: Option<ChatId>,
}

fn build_telegram_client(config: &StaticConfig) -> Result<Option<TelegramClient>> {
    if !config.telegram.enabled() {
        info!("Telegram bot disabled (telegram.bot_token is empty)");
        return Ok(None);
    }

    let api: Arc<dyn TelegramApi> = Arc::new(
        BotApi::from_config(&config.telegram).context("Failed to create Telegram client")?,
    );
    let channel = config
        .telegram
        .channel_enabled()
        .then(|| ChatId::parse(&config.telegram.channel_id));
    if channel.is_none() {
        info!("Telegram channel broadcasts disabled (telegram.channel_id is empty)");
    }

    Ok(Some(TelegramClient { api, channel }))
}

/// Start the bot side: connection check, then polling or webhook registration
async fn start_bot(
    config: &StaticConfig,
    client: &TelegramClient,
    handler: Arc<dyn UpdateHandler>,
    shutdown: watch::Receiver<bool>,
    tasks: &mut Vec<JoinHandle<()>>,
) {
    let report = test_connection(client.api.as_ref(), client.channel.as_ref()).await;
    if !report.connected {
        warn!(
            "Telegram connection test failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        for step in &report.guidance {
            warn!("  {}", step);
        }
    }

    match config.telegram.mode {
        TelegramMode::Polling => {
            let poller = Poller::new(
                client.api.clone(),
                handler,
                bot_commands(),
                config.telegram.poll_timeout_secs,
                Duration::from_secs(config.telegram.retry_delay_secs),
            );
            tasks.push(poller.spawn(shutdown));
        }
        TelegramMode::Webhook => {
            let Some(url) = config.telegram.webhook_url.as_deref().filter(|u| !u.is_empty())
            else {
                warn!("Telegram webhook mode selected but telegram.webhook_url is empty");
                return;
            };
            if let Err(e) = client.api.set_my_commands(&bot_commands()).await {
                warn!("Failed to register bot commands: {}", e);
            }
            match client
                .api
                .set_webhook(url, config.telegram.webhook_secret.as_deref())
                .await
            {
                Ok(()) => info!("Telegram webhook set to {}", url),
                Err(e) => warn!("Failed to set Telegram webhook: {}", e),
            }
        }
    }
}

/// 准备服务器启动的上下文
/// 包括存储、服务、Telegram 机器人与后台任务
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    let config = get_config();
    for problem in config.validate() {
        warn!("Configuration: {}", problem);
    }

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let telegram = build_telegram_client(&config)?;

    // 频道广播走有界队列，调用方不会被 Telegram 阻塞
    let broadcaster: Arc<dyn ChannelBroadcaster> =
        match telegram.as_ref().and_then(|tg| tg.channel.clone().map(|c| (tg, c))) {
            Some((tg, channel)) => {
                let inner = Arc::new(TelegramBroadcaster::new(
                    tg.api.clone(),
                    channel,
                    config.frontend.clone(),
                ));
                let (queue, handle) =
                    BroadcastQueue::spawn(inner, BROADCAST_QUEUE_CAPACITY, shutdown_rx.clone());
                tasks.push(handle);
                Arc::new(queue)
            }
            None => Arc::new(NoopBroadcaster),
        };

    let services = AppServices::new(storage.clone(), broadcaster, &config);

    if !config.api.admin_usernames.is_empty() {
        match services.users.seed_admins(&config.api.admin_usernames).await {
            Ok(count) => debug!("Admin seeding matched {} user(s)", count),
            Err(e) => warn!("Failed to seed admins: {}", e),
        }
    }

    let jwt = JwtService::from_config(&config.api);
    let mut api_state = ApiState::new(services.clone(), jwt)
        .with_internal_token(config.api.internal_token.clone())
        .with_admin_usernames(config.api.admin_usernames.clone());
    if config.api.internal_token.is_empty() {
        info!("Internal API disabled (api.internal_token is empty)");
    }

    let mut outbox = None;
    if let Some(client) = telegram {
        let handler: Arc<dyn UpdateHandler> = Arc::new(BotHandler::new(
            client.api.clone(),
            services.clone(),
            config.frontend.clone(),
            config.telegram.bot_username.clone(),
        ));

        start_bot(
            &config,
            &client,
            handler.clone(),
            shutdown_rx.clone(),
            &mut tasks,
        )
        .await;

        outbox = Some(Arc::new(NotificationOutbox::new(
            client.api.clone(),
            services.notifications.clone(),
            services.linking.clone(),
            config.frontend.clone(),
            config.telegram.bot_username.clone(),
            config.scheduler.outbox_batch_size,
            config.scheduler.outbox_max_attempts,
        )));

        api_state = api_state.with_telegram(TelegramState {
            api: client.api,
            handler,
            channel: client.channel,
            mode: config.telegram.mode,
            webhook_secret: config.telegram.webhook_secret.clone(),
        });
    }

    tasks.extend(scheduler::spawn_jobs(
        &services,
        outbox,
        &config.scheduler,
        shutdown_rx,
    ));

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        config,
        storage,
        services,
        api_state,
        shutdown_tx,
        tasks,
    })
}
