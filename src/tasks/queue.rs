use std::collections::VecDeque;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::domain::ScrapeJob;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    pub channel: String,
    pub date: NaiveDate,
}

#[derive(Debug, Default)]
pub struct RunQueue {
    pending: Mutex<VecDeque<RunTicket>>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dates in ascending order; every channel for one date before the next.
    pub fn from_job(job: &ScrapeJob) -> Self {
        let queue = Self::new();
        for date in job.dates() {
            for channel in job.channels() {
                queue.push(RunTicket {
                    channel: channel.clone(),
                    date,
                });
            }
        }
        queue
    }

    pub fn push(&self, ticket: RunTicket) {
        self.pending.lock().push_back(ticket);
    }

    pub fn pop(&self) -> Option<RunTicket> {
        self.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
