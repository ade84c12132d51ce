use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedLink, Message, UrlAnnotation};

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(https?://[^\s<>"{}|\\^`\[\]]+|www\.[^\s<>"{}|\\^`\[\]]+|t\.me/[a-zA-Z0-9_]+(?:/[0-9]+)?)"#,
    )
    .expect("valid url regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']'];
const CONTEXT_BEFORE: usize = 70;
const CONTEXT_AFTER: usize = 110;
const CONTEXT_FALLBACK: usize = 180;
const ELLIPSIS: char = '…';
const NO_TEXT: &str = "No text in message";

/// Unique links of a message, sorted by canonical URL.
///
/// Structured annotations are read first, then the body is scanned. Both
/// passes reduce a link to the same canonical form, so a link seen by both
/// appears once.
pub fn extract_urls(message: &Message) -> Vec<ExtractedLink> {
    let mut found: BTreeMap<String, ExtractedLink> = BTreeMap::new();
    let mut insert = |source: String| {
        let url = canonical(&source);
        if !url.is_empty() {
            found
                .entry(url.clone())
                .or_insert(ExtractedLink { url, source });
        }
    };

    if !message.annotations.is_empty() {
        let utf16: Vec<u16> = message.text.encode_utf16().collect();
        for annotation in &message.annotations {
            let url = match annotation {
                UrlAnnotation::DisplayTextLink { url } => display_link_target(url),
                UrlAnnotation::AutoLinkedSpan { offset, length } => {
                    auto_linked_span(&utf16, *offset, *length)
                }
            };
            if let Some(url) = url {
                insert(url);
            }
        }
    }

    for url in scan_body(&message.text) {
        insert(url);
    }

    found.into_values().collect()
}

fn display_link_target(url: &str) -> Option<String> {
    let trimmed = url.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn auto_linked_span(utf16: &[u16], offset: usize, length: usize) -> Option<String> {
    let end = offset.checked_add(length)?;
    let span = utf16.get(offset..end)?;
    let text = String::from_utf16_lossy(span);
    display_link_target(&text)
}

fn scan_body(body: &str) -> impl Iterator<Item = String> + '_ {
    URL_REGEX.find_iter(body).filter_map(|m| {
        let raw = m.as_str().trim();
        let lower = raw.to_ascii_lowercase();
        let url = if lower.starts_with("www.") {
            format!("https://{raw}")
        } else if lower.starts_with("t.me/") {
            format!("https://{}", strip_query(raw))
        } else {
            raw.to_string()
        };
        let url = url.trim_end_matches(TRAILING_PUNCTUATION);
        (!url.is_empty()).then(|| url.to_string())
    })
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn canonical(url: &str) -> String {
    let trimmed = url.trim();
    let end = trimmed.find(&['?', '#'][..]).unwrap_or(trimmed.len());
    trimmed[..end].to_string()
}

/// Text around `url` in `body`, for the links log. Always non-empty.
pub fn link_context(body: &str, url: &str) -> String {
    if body.trim().is_empty() {
        return NO_TEXT.to_string();
    }

    let chars: Vec<char> = body.chars().collect();
    let needle: Vec<char> = url.chars().collect();
    let pos = find_case_insensitive(&chars, &needle).or_else(|| {
        let host: Vec<char> = host_portion(url).chars().collect();
        find_case_insensitive(&chars, &host)
    });

    let Some(pos) = pos else {
        let collapsed = collapse_newlines(body.chars());
        let trimmed = collapsed.trim();
        let mut snippet: String = trimmed.chars().take(CONTEXT_FALLBACK).collect();
        if trimmed.chars().count() > CONTEXT_FALLBACK {
            snippet.push(ELLIPSIS);
        }
        return snippet;
    };

    let start = pos.saturating_sub(CONTEXT_BEFORE);
    let end = (pos + needle.len() + CONTEXT_AFTER).min(chars.len());
    let mut context = String::new();
    if start > 0 {
        context.push(ELLIPSIS);
    }
    context.push_str(&collapse_newlines(chars[start..end].iter().copied()));
    if end < chars.len() {
        context.push(ELLIPSIS);
    }
    context.trim().to_string()
}

fn host_portion(url: &str) -> &str {
    let lower = url.to_ascii_lowercase();
    let rest = if lower.starts_with("https://") {
        &url[8..]
    } else if lower.starts_with("http://") {
        &url[7..]
    } else {
        url
    };
    rest.split(&['/', '?', '#'][..]).next().unwrap_or(rest)
}

fn collapse_newlines(chars: impl Iterator<Item = char>) -> String {
    chars
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn find_case_insensitive(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a == b || a.to_lowercase().eq(b.to_lowercase()))
    })
}
