use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{MetadataError, VideoMetadata, VideoMetadataSource};
use crate::config::VideoConfig;

const STDERR_TAIL_CHARS: usize = 400;

/// Video metadata via a local `yt-dlp` binary.
pub struct YtDlpMetadata {
    program: String,
    timeout: Duration,
}

impl YtDlpMetadata {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            program: config.yt_dlp_path.clone(),
            timeout: config.metadata_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    alt_title: Option<String>,
    description: Option<String>,
}

fn parse_info(stdout: &[u8]) -> Result<VideoMetadata, MetadataError> {
    let info: InfoJson = serde_json::from_slice(stdout)?;
    Ok(VideoMetadata {
        title: info.title.or(info.alt_title),
        description: info.description,
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    trimmed
        .chars()
        .skip(count.saturating_sub(STDERR_TAIL_CHARS))
        .collect()
}

#[async_trait]
impl VideoMetadataSource for YtDlpMetadata {
    async fn fetch(&self, url: &str) -> Result<VideoMetadata, MetadataError> {
        let mut command = Command::new(&self.program);
        command
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                "--quiet",
            ])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| MetadataError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(MetadataError::Failed {
                status: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        parse_info(&output.stdout)
    }
}
