//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for bantah using clap's derive macros.

use clap::{Parser, Subcommand};

/// Bantah - social prediction events and peer-to-peer challenges
#[derive(Parser)]
#[command(name = "bantah")]
#[command(version)]
#[command(about = "Bantah backend: REST API, Telegram bot and background jobs", long_about = None)]
pub struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server, bot and background jobs (default)
    Serve,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Telegram bot tools
    Telegram {
        #[command(subcommand)]
        action: TelegramCommands,
    },

    /// Print a session token for development
    Token {
        /// User id placed in the `sub` claim
        #[arg(long)]
        user_id: String,

        /// Username used when the user is provisioned
        #[arg(long)]
        username: Option<String>,
    },

    /// Apply database migrations and exit
    Migrate,
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Telegram management commands
#[derive(Subcommand)]
pub enum TelegramCommands {
    /// Check the bot token and channel access
    Check,

    /// Register a webhook URL with Telegram
    SetWebhook {
        /// Public HTTPS URL ending in /api/telegram/webhook
        url: String,
    },

    /// Remove the webhook so long polling can be used
    DeleteWebhook,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::parse_from(["bantah", "-c", "prod.toml", "telegram", "set-webhook", "https://x/y"]);
        assert_eq!(cli.config.as_deref(), Some("prod.toml"));
        assert!(matches!(
            cli.command,
            Some(Commands::Telegram {
                action: TelegramCommands::SetWebhook { ref url }
            }) if url == "https://x/y"
        ));

        let cli = Cli::parse_from(["bantah"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["bantah", "token", "--user-id", "u1", "--username", "alice"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Token { ref user_id, ref username })
                if user_id == "u1" && username.as_deref() == Some("alice")
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
