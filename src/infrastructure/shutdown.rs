//! Cooperative stop for the archive worker.
//!
//! A run in flight is abandoned at its next await point; entries already
//! flushed to the sinks stay on disk.

use std::fmt;

use tokio::sync::watch;

/// Why the archive was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Interrupt => "interrupt",
            StopReason::Terminate => "terminate",
        })
    }
}

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<Option<StopReason>>,
}

pub struct ShutdownListener {
    receiver: watch::Receiver<Option<StopReason>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Requests a stop. Only the first request is recorded; returns whether
    /// this call was it.
    pub fn trigger(&self, reason: StopReason) -> bool {
        let first = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            tracing::warn!(target: "worker", %reason, "stop requested");
        }
        first
    }
}

impl ShutdownListener {
    /// Resolves once a stop has been requested.
    pub async fn notified(&mut self) -> StopReason {
        if let Ok(current) = self.receiver.wait_for(Option::is_some).await {
            if let Some(reason) = *current {
                return reason;
            }
        }
        // Every handle is gone, so no stop can arrive.
        std::future::pending().await
    }

    pub fn is_triggered(&self) -> bool {
        self.receiver.borrow().is_some()
    }
}

pub fn install_signal_handlers(shutdown: &Shutdown) {
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.trigger(StopReason::Interrupt);
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let terminate = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    if stream.recv().await.is_some() {
                        terminate.trigger(StopReason::Terminate);
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "worker", error = %err, "cannot listen for SIGTERM");
                }
            }
        });
    }
}
