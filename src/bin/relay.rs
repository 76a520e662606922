//! Standalone relay bot
//!
//! Answers `/start`, `/balance`, `/mychallenges` and `/help` by asking the
//! main API. It needs no database of its own.

use clap::Parser;

use bantah::config::{DEFAULT_CONFIG_PATH, get_config, init_config_from};
use bantah::runtime::modes::run_relay;
use bantah::system::init_logging;

#[derive(Parser)]
#[command(name = "bantah-relay", version, about = "Bantah Telegram relay bot")]
struct Args {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c')]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_config_from(args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

    let config = get_config();
    let _guard = init_logging(&config.logging)?;
    run_relay().await
}
