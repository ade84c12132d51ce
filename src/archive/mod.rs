//! One (channel, date) archive run and the pieces it is built from.

pub mod classify;
pub mod links;
pub mod media;
pub mod run;
pub mod sink;
pub mod window;

pub use media::MediaDownloader;
pub use run::{ChannelRun, RunOutcome, RunSummary};
