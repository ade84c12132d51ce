use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use chrono::NaiveDate;
use futures::{pin_mut, TryStreamExt};

use super::{
    classify::{classify, Bucket},
    links::{extract_urls, link_context},
    media::{MediaDownloader, MediaOutcome},
    sink::{link_entry, text_entry, ArchiveSink},
    window::history_in_window,
};
use crate::{
    chat::{ChatClient, ChatError, ResolvedChannel},
    domain::{DataType, DateWindow, ExtractedLink, Message, ScrapeJob},
    transcript::{is_video_link, TranscriptArchiver, TranscriptOutcome, TRANSCRIPTS_FOLDER},
};

const TEXT_FILE: &str = "messages.txt";
const LINKS_FILE: &str = "links.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    RateLimited { seconds: u64 },
    ChannelUnavailable,
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::RateLimited { seconds } => write!(f, "rate limited ({seconds}s)"),
            RunOutcome::ChannelUnavailable => f.write_str("channel unavailable"),
            RunOutcome::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub channel: String,
    pub date: NaiveDate,
    pub messages_seen: usize,
    pub links_saved: usize,
    pub media_saved: usize,
    pub texts_saved: usize,
    pub failures: usize,
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn new(channel: &str, date: NaiveDate) -> Self {
        Self {
            channel: channel.to_string(),
            date,
            messages_seen: 0,
            links_saved: 0,
            media_saved: 0,
            texts_saved: 0,
            failures: 0,
            outcome: RunOutcome::Completed,
        }
    }

    /// Console line for a run that reached the window start.
    pub fn finished_line(&self) -> Option<String> {
        (self.outcome == RunOutcome::Completed)
            .then(|| format!("Finished {} -> {} links saved!", self.channel, self.links_saved))
    }
}

enum Halt {
    RateLimited(u64),
    Failed(anyhow::Error),
}

impl From<ChatError> for Halt {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RateLimited { seconds } => Halt::RateLimited(seconds),
            other => Halt::Failed(other.into()),
        }
    }
}

impl From<anyhow::Error> for Halt {
    fn from(err: anyhow::Error) -> Self {
        Halt::Failed(err)
    }
}

/// Output handles for one run. Sinks exist only for requested data types
/// and close when this value is dropped.
struct RunOutput {
    root: PathBuf,
    texts: Option<ArchiveSink>,
    links: Option<ArchiveSink>,
}

impl RunOutput {
    async fn prepare(job: &ScrapeJob, root: PathBuf) -> anyhow::Result<Self> {
        let mut created = Vec::new();
        for kind in job.data_types() {
            let dir = root.join(kind.folder());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created.push(kind.folder());
        }
        tracing::info!(
            target: "archive",
            root = %root.display(),
            folders = %created.join(", "),
            "created folders"
        );

        let texts = if job.wants(DataType::Text) {
            Some(ArchiveSink::open(root.join(DataType::Text.folder()).join(TEXT_FILE)).await?)
        } else {
            None
        };
        let links = if job.wants(DataType::Links) {
            Some(ArchiveSink::open(root.join(DataType::Links.folder()).join(LINKS_FILE)).await?)
        } else {
            None
        };

        Ok(Self { root, texts, links })
    }

    fn folder(&self, kind: DataType) -> PathBuf {
        self.root.join(kind.folder())
    }
}

/// Archives one (channel, date) pair.
pub struct ChannelRun {
    client: Arc<dyn ChatClient>,
    media: MediaDownloader,
    transcripts: TranscriptArchiver,
    page_size: u32,
}

impl ChannelRun {
    pub fn new(
        client: Arc<dyn ChatClient>,
        media: MediaDownloader,
        transcripts: TranscriptArchiver,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            media,
            transcripts,
            page_size,
        }
    }

    pub async fn execute(&self, job: &ScrapeJob, handle: &str, date: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::new(handle, date);
        tracing::info!(target: "archive", channel = handle, %date, "starting run");

        let outcome = match self.client.resolve_channel(handle).await {
            Ok(channel) => {
                tracing::info!(target: "archive", channel = handle, "Connected to group: {}", channel.title);
                let root = job.channel_dir(handle, date);
                match self.archive(job, &channel, root, date, &mut summary).await {
                    Ok(()) => RunOutcome::Completed,
                    Err(Halt::RateLimited(seconds)) => self.back_off(handle, seconds).await,
                    Err(Halt::Failed(err)) => {
                        tracing::error!(target: "archive", channel = handle, %date, error = %err, "run aborted");
                        RunOutcome::Failed
                    }
                }
            }
            Err(ChatError::RateLimited { seconds }) => self.back_off(handle, seconds).await,
            Err(err) => {
                tracing::error!(target: "archive", channel = handle, error = %err, "could not resolve channel");
                RunOutcome::ChannelUnavailable
            }
        };

        summary.outcome = outcome;
        tracing::info!(
            target: "archive",
            channel = handle,
            %date,
            messages = summary.messages_seen,
            links = summary.links_saved,
            media = summary.media_saved,
            texts = summary.texts_saved,
            failures = summary.failures,
            outcome = %summary.outcome,
            "run finished"
        );
        if let Some(line) = summary.finished_line() {
            println!("{line}");
        }
        summary
    }

    /// The run is not resumed after the pause.
    async fn back_off(&self, handle: &str, seconds: u64) -> RunOutcome {
        tracing::warn!(
            target: "archive",
            channel = handle,
            seconds,
            "rate limited, sleeping and ending this run"
        );
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        RunOutcome::RateLimited { seconds }
    }

    async fn archive(
        &self,
        job: &ScrapeJob,
        channel: &ResolvedChannel,
        root: PathBuf,
        date: NaiveDate,
        summary: &mut RunSummary,
    ) -> Result<(), Halt> {
        let mut output = RunOutput::prepare(job, root).await?;
        let messages = history_in_window(
            self.client.as_ref(),
            channel,
            DateWindow::for_date(date),
            self.page_size,
        );
        pin_mut!(messages);

        while let Some(message) = messages.try_next().await? {
            summary.messages_seen += 1;
            if let Err(err) = self.process(job, channel, &message, &mut output, summary).await {
                summary.failures += 1;
                tracing::error!(
                    target: "archive",
                    channel = %channel.handle,
                    message_id = message.id,
                    error = %err,
                    "failed to process message"
                );
            }
        }

        Ok(())
    }

    async fn process(
        &self,
        job: &ScrapeJob,
        channel: &ResolvedChannel,
        message: &Message,
        output: &mut RunOutput,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        let mut link_count = 0;
        if output.links.is_some() {
            let transcripts_dir = output.folder(DataType::Links).join(TRANSCRIPTS_FOLDER);
            for link in extract_urls(message) {
                let context = link_context(&message.text, &link.url);
                let transcript = self.transcript_note(message, &link, &transcripts_dir).await;
                let entry = link_entry(message, &link.url, &context, transcript.as_deref());
                if let Some(sink) = output.links.as_mut() {
                    sink.append(&entry).await?;
                }
                tracing::debug!(target: "links", message_id = message.id, url = %link.url, "link saved");
                summary.links_saved += 1;
                link_count += 1;
            }
        }

        match classify(message, job.data_types()) {
            Some(Bucket::Media { folder, extension }) => {
                let dir = output.folder(folder);
                match self.media.save(channel, message, &dir, extension).await {
                    Some(MediaOutcome::Downloaded { .. }) => summary.media_saved += 1,
                    Some(MediaOutcome::AlreadyPresent(_)) => {}
                    None => summary.failures += 1,
                }
            }
            Some(Bucket::Text) => {
                if let Some(sink) = output.texts.as_mut() {
                    sink.append(&text_entry(message)).await?;
                    summary.texts_saved += 1;
                }
            }
            None if link_count == 0 => {
                tracing::debug!(target: "archive", message_id = message.id, "nothing to archive");
            }
            None => {}
        }

        Ok(())
    }

    async fn transcript_note(
        &self,
        message: &Message,
        link: &ExtractedLink,
        folder: &Path,
    ) -> Option<String> {
        if !is_video_link(&link.source) {
            return None;
        }
        match self.transcripts.save(&link.source, folder).await {
            Ok(TranscriptOutcome::Saved {
                filename,
                transcript: false,
            }) => {
                tracing::info!(
                    target: "transcript",
                    message_id = message.id,
                    file = %filename,
                    "no transcript track, description saved instead"
                );
                Some(filename)
            }
            Ok(outcome) => outcome.filename().map(str::to_string),
            Err(err) => {
                tracing::error!(
                    target: "transcript",
                    message_id = message.id,
                    url = %link.source,
                    error = %err,
                    "failed to save transcript"
                );
                None
            }
        }
    }
}
