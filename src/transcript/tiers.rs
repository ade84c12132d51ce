use std::fmt;

use super::{TranscriptLine, TranscriptSource, TranscriptTrack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    EnglishManual,
    EnglishGenerated,
    AnyManual,
    AnyGenerated,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::EnglishManual => "english-manual",
            Tier::EnglishGenerated => "english-generated",
            Tier::AnyManual => "any-manual",
            Tier::AnyGenerated => "any-generated",
        })
    }
}

type Selector = fn(&TranscriptTrack) -> bool;

/// Priority order; the first track whose fetch succeeds wins.
const TIERS: [(Tier, Selector); 4] = [
    (Tier::EnglishManual, english_manual),
    (Tier::EnglishGenerated, english_generated),
    (Tier::AnyManual, any_manual),
    (Tier::AnyGenerated, any_generated),
];

fn english_manual(track: &TranscriptTrack) -> bool {
    !track.generated && track.language_code == "en"
}

fn english_generated(track: &TranscriptTrack) -> bool {
    track.generated && track.language_code == "en"
}

fn any_manual(track: &TranscriptTrack) -> bool {
    !track.generated
}

fn any_generated(track: &TranscriptTrack) -> bool {
    track.generated
}

#[derive(Debug)]
pub enum TierSelection {
    Found {
        tier: Tier,
        track: TranscriptTrack,
        lines: Vec<TranscriptLine>,
    },
    Exhausted {
        reason: String,
    },
}

pub async fn acquire(source: &dyn TranscriptSource, video_id: &str) -> TierSelection {
    let tracks = match source.list(video_id).await {
        Ok(tracks) => tracks,
        Err(err) => {
            return TierSelection::Exhausted {
                reason: err.to_string(),
            }
        }
    };

    let mut attempted = vec![false; tracks.len()];
    let mut last_error = None;
    for (tier, selects) in TIERS {
        for (index, track) in tracks.iter().enumerate() {
            if attempted[index] || !selects(track) {
                continue;
            }
            attempted[index] = true;

            match source.fetch(video_id, track).await {
                Ok(lines) => {
                    return TierSelection::Found {
                        tier,
                        track: track.clone(),
                        lines,
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "transcript",
                        video_id,
                        %tier,
                        language = %track.language_code,
                        error = %err,
                        "transcript track failed"
                    );
                    last_error = Some(err.to_string());
                }
            }
        }
    }

    TierSelection::Exhausted {
        reason: last_error
            .unwrap_or_else(|| format!("no transcripts available for video {video_id}")),
    }
}
