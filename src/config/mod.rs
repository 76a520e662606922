mod r#impl;
mod structs;

pub use r#impl::{DEFAULT_CONFIG_PATH, get_config, init_config, init_config_from};
pub use structs::*;

/// TypeScript bindings for the SPA are exported here by `cargo test`
pub const TS_EXPORT_PATH: &str = "../client/src/types/api.generated.ts";
