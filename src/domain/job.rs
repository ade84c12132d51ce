use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Archive buckets a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    Images,
    Videos,
    Audios,
    Text,
    Links,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Images,
        DataType::Videos,
        DataType::Audios,
        DataType::Text,
        DataType::Links,
    ];

    /// Folder name under `<root>/<date>/<channel>/`.
    pub fn folder(&self) -> &'static str {
        match self {
            DataType::Images => "Images",
            DataType::Videos => "Videos",
            DataType::Audios => "Audios",
            DataType::Text => "Text",
            DataType::Links => "Links",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        DataType::ALL
            .into_iter()
            .find(|kind| kind.folder().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!("unknown data type '{trimmed}' (expected Images, Videos, Audios, Text, Links)")
            })
    }
}

/// UTC half-open day `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn for_date(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// One archive request. Built once from the command line and never mutated.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    channels: Vec<String>,
    data_types: BTreeSet<DataType>,
    dates: BTreeSet<NaiveDate>,
    output_root: PathBuf,
}

impl ScrapeJob {
    /// Dates on or after `today` are dropped; callers log them before this point.
    pub fn new(
        channels: impl IntoIterator<Item = String>,
        data_types: impl IntoIterator<Item = DataType>,
        dates: impl IntoIterator<Item = NaiveDate>,
        output_root: impl Into<PathBuf>,
        today: NaiveDate,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let channels = channels
            .into_iter()
            .map(|c| normalize_channel(&c))
            .filter(|c| !c.is_empty() && seen.insert(c.clone()))
            .collect();
        Self {
            channels,
            data_types: data_types.into_iter().collect(),
            dates: dates.into_iter().filter(|d| *d < today).collect(),
            output_root: output_root.into(),
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn data_types(&self) -> &BTreeSet<DataType> {
        &self.data_types
    }

    pub fn wants(&self, kind: DataType) -> bool {
        self.data_types.contains(&kind)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() || self.data_types.is_empty() || self.dates.is_empty()
    }

    /// `<root>/<YYYY-MM-DD>/<channel>`
    pub fn channel_dir(&self, channel: &str, date: NaiveDate) -> PathBuf {
        self.output_root
            .join(date.format("%Y-%m-%d").to_string())
            .join(channel)
    }
}

/// Accepts `name`, `@name`, `t.me/name` and `https://t.me/name`.
pub fn normalize_channel(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let lowered = trimmed.to_ascii_lowercase();
    let name = if lowered.starts_with("https://t.me/")
        || lowered.starts_with("http://t.me/")
        || lowered.starts_with("t.me/")
    {
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    } else {
        trimmed
    };
    name.trim_start_matches('@').to_string()
}
