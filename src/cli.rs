//! Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::domain::{DataType, ScrapeJob};

/// Archive messages, media and links of public chat channels for past days.
#[derive(Parser, Debug, Clone)]
#[command(name = "tg-archiver")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    tg-archiver --groups rustlang --datatypes Text,Links --dates 2025-11-09
    tg-archiver --groups a,https://t.me/b --datatypes images,videos --dates 2025-11-08,2025-11-09 --target-folder out")]
pub struct Args {
    /// Channel handles, `@name`, or t.me links
    #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
    pub groups: Vec<String>,

    /// Any of Images, Videos, Audios, Text, Links (case-insensitive)
    #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
    pub datatypes: Vec<DataType>,

    /// Days to archive (YYYY-MM-DD), each strictly before today (UTC)
    #[arg(long, value_delimiter = ',', required = true, num_args = 1.., value_name = "DATE")]
    pub dates: Vec<String>,

    /// Output root; defaults to ARCHIVE_ROOT or `Database`
    #[arg(long, value_name = "DIR")]
    pub target_folder: Option<PathBuf>,
}

/// Parses the requested dates, logging and dropping unusable ones.
pub fn parse_dates(raw: &[String], today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(raw.len());
    for value in raw.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) if date < today => dates.push(date),
            Ok(date) => {
                tracing::warn!(target: "config", %date, %today, "date is not in the past; skipping");
            }
            Err(err) => {
                tracing::error!(target: "config", value, error = %err, "invalid date; skipping");
            }
        }
    }
    dates
}

impl Args {
    pub fn into_job(self, output_root: PathBuf, today: NaiveDate) -> ScrapeJob {
        let dates = parse_dates(&self.dates, today);
        ScrapeJob::new(self.groups, self.datatypes, dates, output_root, today)
    }
}
