//! Mode routing
//!
//! Entry points for the execution modes:
//! - Server mode (HTTP server, bot and background jobs)
//! - CLI mode (one-off commands)
//! - Relay mode (the standalone relay bot)

pub mod cli;
pub mod relay;
pub mod server;

pub use cli::{CliError, run_cli};
pub use relay::run_relay;
pub use server::run_server;
