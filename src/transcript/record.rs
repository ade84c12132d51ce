use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{video::format_offset, TranscriptLine};

const DESCRIPTION_RULE_WIDTH: usize = 50;
const HEADER_LINES: usize = 4;

pub struct RecordHeader<'a> {
    pub url: &'a str,
    pub video_id: &'a str,
    pub title: &'a str,
    pub saved_at: &'a str,
}

pub enum RecordBody<'a> {
    Transcript(&'a [TranscriptLine]),
    Fallback {
        error: &'a str,
        description: &'a str,
    },
}

pub fn render(header: &RecordHeader<'_>, body: &RecordBody<'_>) -> String {
    let mut out = format!(
        "URL: {}\nVideo ID: {}\nTitle: {}\nSaved: {}\n\n",
        header.url, header.video_id, header.title, header.saved_at
    );

    match body {
        RecordBody::Transcript(lines) => {
            let mut ordered: Vec<&TranscriptLine> = lines.iter().collect();
            ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

            out.push_str("TRANSCRIPT:\n");
            for line in ordered {
                out.push_str(&format_offset(line.start));
                out.push_str(" - ");
                out.push_str(line.text.replace('\n', " ").trim());
                out.push('\n');
            }
        }
        RecordBody::Fallback { error, description } => {
            let rule = "-".repeat(DESCRIPTION_RULE_WIDTH);
            out.push_str(&format!(
                "{error}\n\nFULL VIDEO DESCRIPTION:\n{rule}\n{description}\n{rule}\n"
            ));
        }
    }

    out
}

/// Looks for a record in `folder` whose header names `video_id`.
pub async fn find_existing(folder: &Path, video_id: &str) -> std::io::Result<Option<String>> {
    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    let wanted = format!("Video ID: {video_id}");

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
            continue;
        }
        let Ok(file) = tokio::fs::File::open(&path).await else {
            continue;
        };
        let mut lines = BufReader::new(file).lines();
        for _ in 0..HEADER_LINES {
            match lines.next_line().await {
                Ok(Some(line)) if line == wanted => {
                    return Ok(entry.file_name().to_str().map(str::to_string));
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
    }

    Ok(None)
}
