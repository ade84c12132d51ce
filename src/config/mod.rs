pub mod env;
mod loader;

pub use env::{AppConfig, ConfigError, DirectoryConfig, GatewayConfig, LoggingConfig, VideoConfig};
pub use loader::load_config;
