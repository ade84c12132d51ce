use once_cell::sync::Lazy;
use regex::Regex;

static VIDEO_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([^&\n?#]+)")
        .expect("valid video id regex")
});
static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid filename regex"));
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

const MAX_STEM_CHARS: usize = 150;

pub fn is_video_link(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// File stem for a transcript named after the video title.
pub fn sanitize_title(title: &str, video_id: &str) -> String {
    let replaced = ILLEGAL_FILENAME_CHARS.replace_all(title.trim(), "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    let stem: String = collapsed.chars().take(MAX_STEM_CHARS).collect();
    if stem.trim().is_empty() {
        video_id.to_string()
    } else {
        stem
    }
}

/// `mm:ss`, minutes uncapped.
pub fn format_offset(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
