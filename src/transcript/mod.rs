//! Transcript capture for video links found in chat messages.
//!
//! Each recognized video gets one text record under the `Transcripts` folder,
//! named after the video title. The record carries either the best available
//! transcript or, when none can be fetched, the full video description.

pub mod record;
pub mod tiers;
pub mod video;
pub mod youtube;
pub mod ytdlp;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use thiserror::Error;

use self::{
    record::{RecordBody, RecordHeader},
    tiers::TierSelection,
};

pub use video::{extract_video_id, is_video_link};
pub use youtube::YoutubeTranscripts;
pub use ytdlp::YtDlpMetadata;

pub const TRANSCRIPTS_FOLDER: &str = "Transcripts";
const UNKNOWN_TITLE: &str = "Unknown_Title";
const NO_DESCRIPTION: &str = "No description available";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptTrack {
    pub language_code: String,
    pub language: String,
    pub generated: bool,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    /// Seconds from the start of the video.
    pub start: f64,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to run metadata tool: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("metadata tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("metadata tool exited with {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("unreadable metadata: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcripts are disabled for video {0}")]
    Disabled(String),
    #[error("video {0} is unavailable")]
    Unavailable(String),
    #[error("transcript is empty")]
    Empty,
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid transcript payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid transcript url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait VideoMetadataSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<VideoMetadata, MetadataError>;
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn list(&self, video_id: &str) -> Result<Vec<TranscriptTrack>, TranscriptError>;

    async fn fetch(
        &self,
        video_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptLine>, TranscriptError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    NotVideoLink,
    Existing(String),
    Saved { filename: String, transcript: bool },
}

impl TranscriptOutcome {
    pub fn filename(&self) -> Option<&str> {
        match self {
            TranscriptOutcome::NotVideoLink => None,
            TranscriptOutcome::Existing(name) => Some(name),
            TranscriptOutcome::Saved { filename, .. } => Some(filename),
        }
    }
}

pub struct TranscriptArchiver {
    metadata: Arc<dyn VideoMetadataSource>,
    transcripts: Arc<dyn TranscriptSource>,
    timezone: Tz,
}

impl TranscriptArchiver {
    pub fn new(
        metadata: Arc<dyn VideoMetadataSource>,
        transcripts: Arc<dyn TranscriptSource>,
        timezone: Tz,
    ) -> Self {
        Self {
            metadata,
            transcripts,
            timezone,
        }
    }

    /// Writes a transcript record for `url` into `folder` unless one already
    /// exists for the same video.
    pub async fn save(&self, url: &str, folder: &Path) -> std::io::Result<TranscriptOutcome> {
        let Some(video_id) = extract_video_id(url) else {
            return Ok(TranscriptOutcome::NotVideoLink);
        };

        tokio::fs::create_dir_all(folder).await?;
        if let Some(existing) = record::find_existing(folder, video_id).await? {
            tracing::debug!(target: "transcript", video_id, file = %existing, "transcript already saved");
            return Ok(TranscriptOutcome::Existing(existing));
        }

        let (title, description) = match self.metadata.fetch(url).await {
            Ok(meta) => (
                meta.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                meta.description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            ),
            Err(err) => {
                tracing::warn!(target: "transcript", video_id, error = %err, "video metadata unavailable");
                (
                    video_id.to_string(),
                    format!("Failed to fetch video info: {err}"),
                )
            }
        };

        let filename = format!("{}.txt", video::sanitize_title(&title, video_id));
        let path: PathBuf = folder.join(&filename);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(target: "transcript", video_id, file = %filename, "transcript file already exists");
            return Ok(TranscriptOutcome::Existing(filename));
        }

        let saved_at = Utc::now()
            .with_timezone(&self.timezone)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string();
        let header = RecordHeader {
            url,
            video_id,
            title: &title,
            saved_at: &saved_at,
        };

        let (contents, transcript) =
            match tiers::acquire(self.transcripts.as_ref(), video_id).await {
                TierSelection::Found { tier, track, lines } => {
                    tracing::info!(
                        target: "transcript",
                        video_id,
                        %tier,
                        language = %track.language,
                        lines = lines.len(),
                        "transcript fetched"
                    );
                    (record::render(&header, &RecordBody::Transcript(&lines)), true)
                }
                TierSelection::Exhausted { reason } => {
                    tracing::warn!(target: "transcript", video_id, reason = %reason, "no transcript, saving description");
                    let error = format!("Failed to get transcript: {reason}");
                    let body = RecordBody::Fallback {
                        error: &error,
                        description: &description,
                    };
                    (record::render(&header, &body), false)
                }
            };

        tokio::fs::write(&path, contents).await?;
        tracing::info!(target: "transcript", video_id, file = %filename, "transcript record saved");
        Ok(TranscriptOutcome::Saved {
            filename,
            transcript,
        })
    }
}
