use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

use crate::domain::Message;

const LINK_SEPARATOR_WIDTH: usize = 80;

/// Append-only output file. Every entry is written whole and flushed before
/// the next one starts; the file closes when the sink is dropped.
pub struct ArchiveSink {
    file: File,
    path: PathBuf,
}

impl ArchiveSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub async fn append(&mut self, entry: &str) -> Result<()> {
        self.file
            .write_all(entry.as_bytes())
            .await
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        self.file.flush().await?;
        Ok(())
    }
}

pub fn text_entry(message: &Message) -> String {
    format!(
        "[{}] Sender ID: {}\n{}\n\n",
        message.stamp(),
        message.sender_label(),
        message.text
    )
}

pub fn link_entry(message: &Message, url: &str, context: &str, transcript: Option<&str>) -> String {
    let mut entry = format!(
        "[{}] Sender ID: {} | URL: {}\nContext: {}\n",
        message.stamp(),
        message.sender_label(),
        url,
        context
    );
    if let Some(filename) = transcript {
        entry.push_str(&format!(" → Transcript saved: Transcripts/{filename}\n"));
    }
    entry.push('\n');
    entry.push_str(&"-".repeat(LINK_SEPARATOR_WIDTH));
    entry.push_str("\n\n");
    entry
}
