use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    chat::{ChatClient, ChatError, ResolvedChannel},
    domain::Message,
    infrastructure::progress::ProgressCallback,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    AlreadyPresent(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Saves message media as `<folder>/<message-id>.<ext>`.
///
/// An existing file counts as archived and short-circuits without touching
/// the network. The check is not atomic: two processes writing the same tree
/// can both download.
pub struct MediaDownloader {
    client: Arc<dyn ChatClient>,
    progress: ProgressCallback,
}

impl MediaDownloader {
    pub fn new(client: Arc<dyn ChatClient>, progress: ProgressCallback) -> Self {
        Self { client, progress }
    }

    /// `None` means no artifact was produced; the failure is already logged.
    pub async fn save(
        &self,
        channel: &ResolvedChannel,
        message: &Message,
        folder: &Path,
        extension: &str,
    ) -> Option<MediaOutcome> {
        let path = folder.join(format!("{}.{}", message.id, extension));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(
                target: "media",
                message_id = message.id,
                path = %path.display(),
                "media already archived"
            );
            return Some(MediaOutcome::AlreadyPresent(path));
        }

        match self.client.download_media(channel, message, &path).await {
            Ok(bytes) => Some(self.finish(path, bytes)),
            Err(ChatError::FileReferenceExpired) => {
                tracing::info!(
                    target: "media",
                    message_id = message.id,
                    "file reference expired, refetching message"
                );
                self.retry_with_fresh_reference(channel, message.id, path)
                    .await
            }
            Err(err) => {
                tracing::error!(
                    target: "media",
                    message_id = message.id,
                    error = %err,
                    "download failed"
                );
                None
            }
        }
    }

    async fn retry_with_fresh_reference(
        &self,
        channel: &ResolvedChannel,
        message_id: i64,
        path: PathBuf,
    ) -> Option<MediaOutcome> {
        let refreshed = match self.client.get_message(channel, message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::error!(
                    target: "media",
                    message_id,
                    "refetch failed: message no longer available"
                );
                return None;
            }
            Err(err) => {
                tracing::error!(target: "media", message_id, error = %err, "refetch failed");
                return None;
            }
        };

        match self.client.download_media(channel, &refreshed, &path).await {
            Ok(bytes) => Some(self.finish(path, bytes)),
            Err(err) => {
                tracing::error!(
                    target: "media",
                    message_id,
                    error = %err,
                    "download failed after refetch"
                );
                None
            }
        }
    }

    fn finish(&self, path: PathBuf, bytes: u64) -> MediaOutcome {
        (self.progress)(bytes);
        tracing::debug!(target: "media", path = %path.display(), bytes, "media saved");
        MediaOutcome::Downloaded { path, bytes }
    }
}
