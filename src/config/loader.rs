use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, GatewayConfig, LoggingConfig, VideoConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = var("CHAT_GATEWAY_URL").ok_or(ConfigError::Missing("CHAT_GATEWAY_URL"))?;
        let base_url = Url::parse(raw_url.trim()).map_err(|err| ConfigError::Invalid {
            key: "CHAT_GATEWAY_URL",
            reason: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "CHAT_GATEWAY_URL",
                reason: format!("unsupported scheme {}", base_url.scheme()),
            });
        }
        let token = var("CHAT_GATEWAY_TOKEN").ok_or(ConfigError::Missing("CHAT_GATEWAY_TOKEN"))?;

        let gateway = GatewayConfig {
            base_url,
            token,
            page_size: var("CHAT_PAGE_SIZE")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(100),
            request_timeout: millis(var("CHAT_REQUEST_TIMEOUT_MS"), 20_000),
        };

        let directories = DirectoryConfig {
            archive_root: var("ARCHIVE_ROOT").unwrap_or_else(|| "Database".to_string()),
            logs_dir: var("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let timezone = var("ARCHIVE_TIMEZONE").unwrap_or_else(|| "UTC".to_string());

        let video = VideoConfig {
            yt_dlp_path: var("YT_DLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            metadata_timeout: millis(var("METADATA_TIMEOUT_MS"), 60_000),
            transcript_timeout: millis(var("TRANSCRIPT_TIMEOUT_MS"), 20_000),
        };

        Ok(Self {
            gateway,
            directories,
            logging,
            timezone,
            video,
        })
    }
}

fn millis(value: Option<String>, default: u64) -> Duration {
    Duration::from_millis(
        value
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default),
    )
}
