//! CLI mode
//!
//! Runs every subcommand except `serve`. Output goes to the terminal, not
//! the log.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::api::JwtService;
use crate::cli::{Commands, ConfigCommands, TelegramCommands};
use crate::config::{StaticConfig, get_config};
use crate::errors::BantahError;
use crate::storage::StorageFactory;
use crate::telegram::{BotApi, ChatId, ConnectionReport, TelegramApi, test_connection};

#[derive(Debug)]
pub enum CliError {
    ConfigError(String),
    StorageError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::ConfigError(msg) => format!("Config error: {}", msg),
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        format!("{} {}", "Error:".red().bold(), self.format_simple())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<BantahError> for CliError {
    fn from(err: BantahError) -> Self {
        match err {
            BantahError::DatabaseConfig(_)
            | BantahError::DatabaseConnection(_)
            | BantahError::DatabaseOperation(_) => CliError::StorageError(err.message()),
            other => CliError::CommandError(other.format_simple()),
        }
    }
}

/// Run a CLI subcommand against the loaded configuration
pub async fn run_cli(command: Commands) -> Result<(), CliError> {
    let config = get_config();
    match command {
        Commands::Serve => Err(CliError::CommandError(
            "serve is handled by the server mode".to_string(),
        )),
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => config_generate(output_path, force),
        Commands::Telegram { action } => run_telegram(&config, action).await,
        Commands::Token { user_id, username } => issue_token(&config, &user_id, username.as_deref()),
        Commands::Migrate => {
            let storage = StorageFactory::create().await?;
            println!(
                "{} {}",
                "Migrations applied on".green(),
                storage.backend_name().blue()
            );
            Ok(())
        }
    }
}

fn config_generate(output_path: Option<String>, force: bool) -> Result<(), CliError> {
    let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());

    if !force && Path::new(&path).exists() {
        return Err(CliError::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            path
        )));
    }

    println!(
        "{} {}",
        "Generating configuration file...".yellow(),
        path.blue()
    );
    StaticConfig::default()
        .save_to_file(&path)
        .map_err(|e| CliError::ConfigError(format!("Failed to write {}: {}", path, e)))?;

    println!(
        "  {} {}",
        "Configuration file generated successfully".green(),
        path.blue()
    );
    println!(
        "  {}",
        "Environment variables (BANTAH__SECTION__KEY, TELEGRAM_BOT_TOKEN, ...) override file values"
            .dimmed()
    );
    Ok(())
}

fn telegram_client(config: &StaticConfig) -> Result<Arc<dyn TelegramApi>, CliError> {
    if !config.telegram.enabled() {
        return Err(CliError::ConfigError(
            "telegram.bot_token (TELEGRAM_BOT_TOKEN) is not set".to_string(),
        ));
    }
    Ok(Arc::new(BotApi::from_config(&config.telegram)?))
}

fn print_report(report: &ConnectionReport) {
    if let Some(bot) = &report.bot {
        println!(
            "{} @{} ({})",
            "Bot:".bold(),
            bot.username.as_deref().unwrap_or("unknown"),
            bot.id
        );
    }
    if let Some(channel) = &report.channel {
        println!(
            "{} {} ({}, {})",
            "Channel:".bold(),
            channel.title,
            channel.kind,
            channel.id
        );
    }
    if report.connected {
        println!("{}", "Connection OK".green());
        return;
    }
    println!(
        "{} {}",
        "Connection failed:".red(),
        report.error.as_deref().unwrap_or("unknown error")
    );
    for step in &report.guidance {
        println!("  {} {}", "-".yellow(), step);
    }
}

async fn run_telegram(config: &StaticConfig, action: TelegramCommands) -> Result<(), CliError> {
    let api = telegram_client(config)?;
    match action {
        TelegramCommands::Check => {
            let channel = config
                .telegram
                .channel_enabled()
                .then(|| ChatId::parse(&config.telegram.channel_id));
            let report = test_connection(api.as_ref(), channel.as_ref()).await;
            print_report(&report);
            if report.connected {
                Ok(())
            } else {
                Err(CliError::CommandError("Telegram check failed".to_string()))
            }
        }
        TelegramCommands::SetWebhook { url } => {
            api.set_webhook(&url, config.telegram.webhook_secret.as_deref())
                .await?;
            println!("{} {}", "Webhook set to".green(), url.blue());
            Ok(())
        }
        TelegramCommands::DeleteWebhook => {
            api.delete_webhook().await?;
            println!("{}", "Webhook deleted".green());
            Ok(())
        }
    }
}

fn issue_token(
    config: &StaticConfig,
    user_id: &str,
    username: Option<&str>,
) -> Result<(), CliError> {
    // A random per-process secret would make the token useless to the server
    if config.api.jwt_secret.is_empty() {
        return Err(CliError::ConfigError(
            "api.jwt_secret must be set to issue tokens".to_string(),
        ));
    }

    let jwt = JwtService::from_config(&config.api);
    let token = jwt
        .issue(user_id, username)
        .map_err(|e| CliError::CommandError(format!("Failed to sign token: {}", e)))?;
    println!("{}", token);
    Ok(())
}
