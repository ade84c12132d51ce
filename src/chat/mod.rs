//! Boundary to the chat-protocol client.
//!
//! The archiver never talks to the protocol directly; it consumes the four
//! capabilities of [`ChatClient`]. Session setup and authentication live on
//! the other side of this trait.

#[cfg(test)]
pub(crate) mod fake;
pub mod gateway;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Message;

pub use gateway::GatewayClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel {
    pub id: i64,
    pub handle: String,
    pub title: String,
}

/// One backward page of history: messages strictly older than `offset_date`
/// (first page) or with id below `offset_id` (later pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset_date: DateTime<Utc>,
    pub offset_id: Option<i64>,
    pub limit: u32,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("rate limited by remote, retry after {seconds}s")]
    RateLimited { seconds: u64 },
    #[error("file reference expired")]
    FileReferenceExpired,
    #[error("channel '{0}' not found or not accessible")]
    ChannelNotFound(String),
    #[error("message {0} has no downloadable media")]
    NoMedia(i64),
    #[error("remote error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn resolve_channel(&self, handle: &str) -> Result<ResolvedChannel, ChatError>;

    /// Newest first.
    async fn history_page(
        &self,
        channel: &ResolvedChannel,
        page: PageRequest,
    ) -> Result<Vec<Message>, ChatError>;

    async fn get_message(
        &self,
        channel: &ResolvedChannel,
        message_id: i64,
    ) -> Result<Option<Message>, ChatError>;

    /// Writes the message's media to `dest` and returns the byte count.
    async fn download_media(
        &self,
        channel: &ResolvedChannel,
        message: &Message,
        dest: &Path,
    ) -> Result<u64, ChatError>;
}
