//! Bantah server and management CLI

use clap::Parser;

use bantah::cli::{Cli, Commands};
use bantah::config::{DEFAULT_CONFIG_PATH, get_config, init_config_from};
use bantah::runtime::modes::{run_cli, run_server};
use bantah::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_config_from(cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

    match cli.command {
        None | Some(Commands::Serve) => {
            let config = get_config();
            // 保持 guard 存活直到进程退出，确保日志刷盘
            let _guard = init_logging(&config.logging)?;
            run_server().await
        }
        Some(command) => {
            if let Err(e) = run_cli(command).await {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
