use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    VideoNote,
    /// Attachments that are not archived as media (documents, stickers, previews).
    Other,
    #[default]
    None,
}

impl MediaKind {
    pub fn is_none(&self) -> bool {
        matches!(self, MediaKind::None)
    }
}

/// Link markup attached to a message body.
///
/// Offsets and lengths count UTF-16 code units, as the chat protocol does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlAnnotation {
    DisplayTextLink { url: String },
    AutoLinkedSpan { offset: usize, length: usize },
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub text: String,
    pub annotations: Vec<UrlAnnotation>,
    pub media: MediaKind,
}

impl Message {
    pub fn sender_label(&self) -> String {
        self.sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn stamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A URL found in a message, keyed by its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Trimmed, without query string or fragment.
    pub url: String,
    /// The form the link was found in, query string kept.
    pub source: String,
}
