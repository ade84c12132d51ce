use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    archive::{ChannelRun, RunSummary},
    domain::ScrapeJob,
    infrastructure::shutdown::ShutdownListener,
    tasks::queue::RunQueue,
};

/// Drains the run queue one (channel, date) pair at a time.
pub struct ArchiveWorker {
    queue: Arc<RunQueue>,
    run: Arc<ChannelRun>,
    job: Arc<ScrapeJob>,
}

impl ArchiveWorker {
    pub fn new(queue: Arc<RunQueue>, run: Arc<ChannelRun>, job: Arc<ScrapeJob>) -> Self {
        Self { queue, run, job }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<Vec<RunSummary>> {
        tokio::spawn(async move { self.run_loop(&mut shutdown).await })
    }

    pub async fn run_loop(&self, shutdown: &mut ShutdownListener) -> Vec<RunSummary> {
        let mut summaries = Vec::new();
        if self.queue.is_empty() {
            tracing::warn!(target: "worker", "archive worker started with nothing queued");
            return summaries;
        }
        tracing::info!(target: "worker", pending = self.queue.len(), "archive worker started");

        while let Some(ticket) = self.queue.pop() {
            if shutdown.is_triggered() {
                break;
            }

            // Dropping the run future closes its sinks; flushed entries stay.
            let summary = tokio::select! {
                summary = self.run.execute(&self.job, &ticket.channel, ticket.date) => summary,
                reason = shutdown.notified() => {
                    tracing::info!(
                        target: "worker",
                        channel = %ticket.channel,
                        date = %ticket.date,
                        %reason,
                        "shutdown requested; abandoning run"
                    );
                    break;
                }
            };
            summaries.push(summary);
        }

        tracing::info!(
            target: "worker",
            completed = summaries.len(),
            skipped = self.queue.len(),
            "archive worker stopped"
        );
        summaries
    }
}
