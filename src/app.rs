use std::sync::Arc;

use anyhow::Result;
use chrono_tz::Tz;
use reqwest::Client;
use tokio::task::JoinHandle;

use crate::{
    archive::{ChannelRun, MediaDownloader, RunOutcome, RunSummary},
    chat::{ChatClient, GatewayClient},
    config::AppConfig,
    domain::ScrapeJob,
    infrastructure::{directories::ResolvedPaths, progress, shutdown::Shutdown},
    tasks::{processor::ArchiveWorker, queue::RunQueue},
    transcript::{TranscriptArchiver, YoutubeTranscripts, YtDlpMetadata},
};

pub struct ArchiverApp {
    _paths: ResolvedPaths,
    worker: Arc<ArchiveWorker>,
    shutdown: Shutdown,
}

impl ArchiverApp {
    pub fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        job: ScrapeJob,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(format!("tg-archiver/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let timezone: Tz = config.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                target: "config",
                timezone = %config.timezone,
                "unknown ARCHIVE_TIMEZONE, using UTC"
            );
            chrono_tz::UTC
        });

        let client: Arc<dyn ChatClient> = Arc::new(GatewayClient::new(
            http_client.clone(),
            config.gateway.clone(),
        ));
        let transcripts = TranscriptArchiver::new(
            Arc::new(YtDlpMetadata::new(&config.video)),
            Arc::new(YoutubeTranscripts::new(http_client, &config.video)),
            timezone,
        );
        let media = MediaDownloader::new(client.clone(), progress::stdout_reporter());
        let run = Arc::new(ChannelRun::new(
            client,
            media,
            transcripts,
            config.gateway.page_size,
        ));

        let queue = Arc::new(RunQueue::from_job(&job));
        tracing::info!(
            target: "worker",
            runs = queue.len(),
            channels = job.channels().len(),
            root = %job.output_root().display(),
            "archive job queued"
        );
        let worker = Arc::new(ArchiveWorker::new(queue, run, Arc::new(job)));

        Ok(Self {
            _paths: paths,
            worker,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<Vec<RunSummary>> {
        let ArchiverApp {
            _paths: _,
            worker,
            shutdown,
        } = self;

        let handle: JoinHandle<Vec<RunSummary>> = worker.spawn(shutdown.subscribe());
        let summaries = match handle.await {
            Ok(summaries) => summaries,
            Err(err) if err.is_panic() => {
                tracing::error!(target: "worker", "archive worker panicked");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let links: usize = summaries.iter().map(|s| s.links_saved).sum();
        let limited = summaries
            .iter()
            .filter(|s| matches!(s.outcome, RunOutcome::RateLimited { .. }))
            .count();
        tracing::info!(
            target: "worker",
            runs = summaries.len(),
            links,
            rate_limited = limited,
            "archive finished"
        );
        Ok(summaries)
    }
}
