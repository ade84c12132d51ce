use std::{
    io::{self, Write},
    sync::Arc,
};

/// Receives the byte count of every completed download.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

pub const BYTES_MARKER: &str = "BYTES_DOWNLOADED:";

/// Line consumed by the external progress monitor.
pub fn marker_line(bytes: u64) -> String {
    format!("{BYTES_MARKER}{bytes}")
}

pub fn stdout_reporter() -> ProgressCallback {
    Arc::new(|bytes| {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", marker_line(bytes));
        let _ = out.flush();
    })
}
