use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Legacy environment variable names still honoured by the loader.
///
/// 部署脚本仍在使用这些变量名，加载时映射到对应的配置键。
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.database_url"),
    ("PORT", "server.port"),
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_CHANNEL_ID", "telegram.channel_id"),
    ("TELEGRAM_BOT_USERNAME", "telegram.bot_username"),
    ("FRONTEND_URL", "frontend.url"),
    ("MAIN_API_URL", "relay.main_api_url"),
    ("MINI_APP_URL", "relay.mini_app_url"),
];

/// How the bot receives updates from Telegram
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TelegramMode {
    #[default]
    Polling,
    Webhook,
}

/// 静态配置（从 TOML 与环境变量加载，启动时使用）
///
/// 优先级：ENV > config.toml > 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub game: GameConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// ENV 前缀：BANTAH，分隔符：__
    /// 示例：BANTAH__SERVER__PORT=9999
    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let _ = dotenvy::dotenv();

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BANTAH")
                    .separator("__")
                    .try_parsing(true),
            );

        let built = apply_legacy_env(builder).and_then(|b| b.build());

        match built {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns human-readable problems with the loaded configuration.
    /// Nothing here is fatal; startup logs each entry as a warning.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if url::Url::parse(&self.frontend.url).is_err() {
            problems.push(format!("frontend.url is not a valid URL: {}", self.frontend.url));
        }

        if self.telegram.enabled() {
            if self.telegram.channel_id.trim().is_empty() {
                problems.push(
                    "telegram.channel_id is empty, channel broadcasts are disabled".to_string(),
                );
            }
            if self.telegram.mode == TelegramMode::Webhook
                && self.telegram.webhook_url.as_deref().is_none_or(str::is_empty)
            {
                problems.push(
                    "telegram.mode is webhook but telegram.webhook_url is not set".to_string(),
                );
            }
        }

        if self.api.jwt_secret.is_empty() {
            problems.push(
                "api.jwt_secret is empty, sessions will not survive a restart".to_string(),
            );
        }

        if self.game.platform_fee_bps > 10_000 {
            problems.push("game.platform_fee_bps must be at most 10000".to_string());
        }

        problems
    }
}

fn apply_legacy_env(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (var, key) in LEGACY_ENV_KEYS {
        if let Ok(value) = std::env::var(var)
            && !value.trim().is_empty()
        {
            builder = builder.set_override(*key, value)?;
        }
    }
    Ok(builder)
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// HTTP API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HS256 secret shared with the identity layer that issues session tokens
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_session_hours")]
    pub session_hours: u64,
    /// Shared secret for service-to-service routes; empty disables them
    #[serde(default)]
    pub internal_token: String,
    /// Usernames promoted to admin on startup
    #[serde(default)]
    pub admin_usernames: Vec<String>,
}

/// Frontend (SPA and Telegram mini-app) location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_frontend_url")]
    pub url: String,
}

impl FrontendConfig {
    pub fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn mini_app_url(&self) -> String {
        format!("{}/telegram-mini-app", self.base())
    }

    pub fn link_url(&self, token: &str) -> String {
        format!("{}/telegram-link?token={}", self.base(), token)
    }

    pub fn event_url(&self, event_id: i64) -> String {
        format!("{}/events/{}/chat", self.base(), event_id)
    }

    pub fn challenge_url(&self, challenge_id: i64) -> String {
        format!("{}/challenges/{}", self.base(), challenge_id)
    }

    pub fn challenges_url(&self) -> String {
        format!("{}/challenges", self.base())
    }

    pub fn wallet_url(&self) -> String {
        format!("{}/wallet", self.base())
    }

    pub fn leaderboard_url(&self) -> String {
        format!("{}/leaderboard", self.base())
    }
}

/// Telegram 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Numeric id (`-100…`) or `@channelname`
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub bot_username: String,
    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub mode: TelegramMode,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_link_token_ttl_secs")]
    pub link_token_ttl_secs: u64,
}

impl TelegramConfig {
    pub fn enabled(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }

    pub fn channel_enabled(&self) -> bool {
        self.enabled() && !self.channel_id.trim().is_empty()
    }
}

/// Standalone relay bot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_main_api_url")]
    pub main_api_url: String,
    /// Falls back to `main_api_url` when unset
    #[serde(default)]
    pub mini_app_url: Option<String>,
}

impl RelayConfig {
    pub fn mini_app_base(&self) -> &str {
        self.mini_app_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.main_api_url)
            .trim_end_matches('/')
    }
}

/// 后台任务调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_event_interval_secs")]
    pub event_interval_secs: u64,
    #[serde(default = "default_ending_soon_minutes")]
    pub ending_soon_minutes: i64,
    #[serde(default = "default_challenge_interval_secs")]
    pub challenge_interval_secs: u64,
    #[serde(default = "default_challenge_pending_hours")]
    pub challenge_pending_hours: i64,
    #[serde(default = "default_outbox_interval_secs")]
    pub outbox_interval_secs: u64,
    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: u64,
    #[serde(default = "default_outbox_max_attempts")]
    pub outbox_max_attempts: i32,
}

/// Wagering rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Fee taken from event pools on resolution, in basis points
    #[serde(default)]
    pub platform_fee_bps: u32,
    #[serde(default = "default_min_stake")]
    pub min_stake: i64,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
    #[serde(default = "default_leaderboard_broadcast_top")]
    pub leaderboard_broadcast_top: u64,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "sqlite://bantah.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_session_hours() -> u64 {
    24 * 7
}

fn default_frontend_url() -> String {
    "https://betchat.replit.app".to_string()
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_link_token_ttl_secs() -> u64 {
    600
}

fn default_main_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_event_interval_secs() -> u64 {
    60
}

fn default_ending_soon_minutes() -> i64 {
    60
}

fn default_challenge_interval_secs() -> u64 {
    300
}

fn default_challenge_pending_hours() -> i64 {
    72
}

fn default_outbox_interval_secs() -> u64 {
    5
}

fn default_outbox_batch_size() -> u64 {
    50
}

fn default_outbox_max_attempts() -> i32 {
    3
}

fn default_min_stake() -> i64 {
    100
}

fn default_max_title_len() -> usize {
    200
}

fn default_leaderboard_broadcast_top() -> u64 {
    10
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            session_hours: default_session_hours(),
            internal_token: String::new(),
            admin_usernames: Vec::new(),
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            url: default_frontend_url(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            bot_username: String::new(),
            api_base_url: default_telegram_api_base_url(),
            mode: TelegramMode::default(),
            webhook_url: None,
            webhook_secret: None,
            poll_timeout_secs: default_poll_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            link_token_ttl_secs: default_link_token_ttl_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            main_api_url: default_main_api_url(),
            mini_app_url: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            event_interval_secs: default_event_interval_secs(),
            ending_soon_minutes: default_ending_soon_minutes(),
            challenge_interval_secs: default_challenge_interval_secs(),
            challenge_pending_hours: default_challenge_pending_hours(),
            outbox_interval_secs: default_outbox_interval_secs(),
            outbox_batch_size: default_outbox_batch_size(),
            outbox_max_attempts: default_outbox_max_attempts(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 0,
            min_stake: default_min_stake(),
            max_title_len: default_max_title_len(),
            leaderboard_broadcast_top: default_leaderboard_broadcast_top(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StaticConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.telegram.retry_delay_secs, 5);
        assert_eq!(config.telegram.mode, TelegramMode::Polling);
        assert!(!config.telegram.enabled());
        assert!(!config.telegram.channel_enabled());
    }

    #[test]
    fn test_frontend_urls_trim_trailing_slash() {
        let frontend = FrontendConfig {
            url: "https://bantah.app/".to_string(),
        };
        assert_eq!(
            frontend.mini_app_url(),
            "https://bantah.app/telegram-mini-app"
        );
        assert_eq!(
            frontend.link_url("abc"),
            "https://bantah.app/telegram-link?token=abc"
        );
        assert_eq!(frontend.event_url(3), "https://bantah.app/events/3/chat");
        assert_eq!(frontend.challenge_url(9), "https://bantah.app/challenges/9");
    }

    #[test]
    fn test_relay_mini_app_fallback() {
        let mut relay = RelayConfig::default();
        assert_eq!(relay.mini_app_base(), "http://localhost:5000");
        relay.mini_app_url = Some("https://bantah.app/".to_string());
        assert_eq!(relay.mini_app_base(), "https://bantah.app");
    }

    #[test]
    fn test_validate_reports_webhook_without_url() {
        let mut config = StaticConfig::default();
        config.api.jwt_secret = "secret".to_string();
        config.telegram.bot_token = "123:abc".to_string();
        config.telegram.channel_id = "@bantah".to_string();
        config.telegram.mode = TelegramMode::Webhook;
        let problems = config.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("webhook_url"));
    }

    #[test]
    fn test_sample_config_round_trips() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample should parse");
        assert_eq!(parsed.server.port, 5000);
        assert_eq!(parsed.frontend.url, "https://betchat.replit.app");
    }
}
