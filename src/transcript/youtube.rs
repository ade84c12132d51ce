use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::ACCEPT_LANGUAGE, Client};
use serde::Deserialize;
use url::Url;

use super::{TranscriptError, TranscriptLine, TranscriptSource, TranscriptTrack};
use crate::config::VideoConfig;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

/// Caption tracks read from the public watch page.
pub struct YoutubeTranscripts {
    client: Client,
    watch_url: String,
    timeout: Duration,
}

impl YoutubeTranscripts {
    pub fn new(client: Client, config: &VideoConfig) -> Self {
        Self {
            client,
            watch_url: WATCH_URL.to_string(),
            timeout: config.transcript_timeout,
        }
    }

    #[cfg(test)]
    fn with_watch_url(mut self, watch_url: String) -> Self {
        self.watch_url = watch_url;
        self
    }

    async fn get_text(&self, url: Url) -> Result<String, TranscriptError> {
        let body = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.8")
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    tracklist: Option<Tracklist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracklist {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    name: Option<CaptionName>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl CaptionTrack {
    fn into_track(self) -> TranscriptTrack {
        let language = self
            .name
            .and_then(|name| {
                name.simple_text.or_else(|| {
                    let joined: String = name.runs.into_iter().map(|run| run.text).collect();
                    (!joined.is_empty()).then_some(joined)
                })
            })
            .unwrap_or_else(|| self.language_code.clone());
        TranscriptTrack {
            generated: self.kind.as_deref() == Some("asr"),
            language,
            language_code: self.language_code,
            base_url: self.base_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedEvent {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(default)]
    segs: Vec<TimedSegment>,
}

#[derive(Debug, Deserialize)]
struct TimedSegment {
    #[serde(default)]
    utf8: String,
}

fn parse_tracks(html: &str, video_id: &str) -> Result<Vec<TranscriptTrack>, TranscriptError> {
    let start = html
        .find(PLAYER_RESPONSE_MARKER)
        .map(|idx| idx + PLAYER_RESPONSE_MARKER.len())
        .ok_or_else(|| TranscriptError::Unavailable(video_id.to_string()))?;

    // The object is followed by more script; read exactly one JSON value.
    let player = serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<PlayerResponse>()
        .next()
        .ok_or_else(|| TranscriptError::Unavailable(video_id.to_string()))??;

    let tracks = player
        .captions
        .and_then(|captions| captions.tracklist)
        .map(|tracklist| tracklist.caption_tracks)
        .unwrap_or_default();
    if tracks.is_empty() {
        return Err(TranscriptError::Disabled(video_id.to_string()));
    }

    Ok(tracks.into_iter().map(CaptionTrack::into_track).collect())
}

fn parse_timed_text(body: &str) -> Result<Vec<TranscriptLine>, TranscriptError> {
    if body.trim().is_empty() {
        return Err(TranscriptError::Empty);
    }
    let timed: TimedText = serde_json::from_str(body)?;
    let lines: Vec<TranscriptLine> = timed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.into_iter().map(|seg| seg.utf8).collect();
            let text = text.replace('\n', " ").trim().to_string();
            (!text.is_empty()).then(|| TranscriptLine {
                start: event.start_ms as f64 / 1000.0,
                text,
            })
        })
        .collect();

    if lines.is_empty() {
        Err(TranscriptError::Empty)
    } else {
        Ok(lines)
    }
}

fn json3_url(base_url: &str) -> Result<Url, TranscriptError> {
    let mut url = Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("fmt", "json3");
    Ok(url)
}

#[async_trait]
impl TranscriptSource for YoutubeTranscripts {
    async fn list(&self, video_id: &str) -> Result<Vec<TranscriptTrack>, TranscriptError> {
        let mut url = Url::parse(&self.watch_url)?;
        url.query_pairs_mut()
            .append_pair("v", video_id)
            .append_pair("hl", "en");
        let html = self.get_text(url).await?;
        parse_tracks(&html, video_id)
    }

    async fn fetch(
        &self,
        _video_id: &str,
        track: &TranscriptTrack,
    ) -> Result<Vec<TranscriptLine>, TranscriptError> {
        let body = self.get_text(json3_url(&track.base_url)?).await?;
        parse_timed_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCH_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[
        {"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English"},"languageCode":"en"},
        {"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=es&kind=asr","name":{"runs":[{"text":"Spanish (auto-generated)"}]},"languageCode":"es","kind":"asr"}
    ]}},"videoDetails":{"videoId":"abc"}};var meta = {"x":1};</script>"#;

    #[test]
    fn reads_caption_tracks_from_watch_page() {
        let tracks = parse_tracks(WATCH_PAGE, "abc").unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language, "English");
        assert!(!tracks[0].generated);
        assert_eq!(tracks[1].language_code, "es");
        assert_eq!(tracks[1].language, "Spanish (auto-generated)");
        assert!(tracks[1].generated);
    }

    #[test]
    fn page_without_captions_means_disabled() {
        let html = r#"ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"}};"#;
        assert!(matches!(
            parse_tracks(html, "abc"),
            Err(TranscriptError::Disabled(id)) if id == "abc"
        ));
        assert!(matches!(
            parse_tracks("<html></html>", "abc"),
            Err(TranscriptError::Unavailable(_))
        ));
    }

    #[test]
    fn parses_timed_text_events() {
        let body = r#"{"events":[
            {"tStartMs":0,"dDurationMs":10},
            {"tStartMs":1500,"segs":[{"utf8":"hello"},{"utf8":" world"}]},
            {"tStartMs":2000,"segs":[{"utf8":"\n"}]},
            {"tStartMs":65000,"segs":[{"utf8":"two\nlines"}]}
        ]}"#;
        let lines = parse_timed_text(body).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "hello world");
        assert_eq!(lines[0].start, 1.5);
        assert_eq!(lines[1].text, "two lines");
        assert!(matches!(parse_timed_text(""), Err(TranscriptError::Empty)));
    }

    #[test]
    fn forces_json3_format() {
        let url = json3_url("https://www.youtube.com/api/timedtext?v=abc&fmt=srv3&lang=en").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=json3"
        );
    }

    mod http {
        use httpmock::prelude::*;
        use serde_json::json;

        use super::*;

        fn transcripts_for(server: &MockServer) -> YoutubeTranscripts {
            let config = VideoConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                metadata_timeout: Duration::from_secs(5),
                transcript_timeout: Duration::from_secs(5),
            };
            YoutubeTranscripts::new(Client::new(), &config).with_watch_url(server.url("/watch"))
        }

        fn watch_page(server: &MockServer) -> String {
            let player = json!({
                "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [{
                    "baseUrl": server.url("/api/timedtext?v=abc&lang=es&fmt=srv3"),
                    "name": {"simpleText": "Spanish (auto-generated)"},
                    "languageCode": "es",
                    "kind": "asr"
                }]}}
            });
            format!("<html><script>var ytInitialPlayerResponse = {player};var x = 1;</script></html>")
        }

        #[tokio::test]
        async fn lists_tracks_then_fetches_json3_captions() {
            let server = MockServer::start();
            let page = watch_page(&server);
            let watch = server.mock(|when, then| {
                when.method(GET)
                    .path("/watch")
                    .query_param("v", "abc")
                    .query_param("hl", "en");
                then.status(200).body(page);
            });
            let timed = server.mock(|when, then| {
                when.method(GET)
                    .path("/api/timedtext")
                    .query_param("lang", "es")
                    .query_param("fmt", "json3");
                then.status(200).json_body(json!({"events": [
                    {"tStartMs": 61000, "segs": [{"utf8": "hola"}, {"utf8": " mundo"}]}
                ]}));
            });
            let source = transcripts_for(&server);

            let tracks = source.list("abc").await.unwrap();
            watch.assert();
            assert_eq!(tracks.len(), 1);
            assert!(tracks[0].generated);
            assert_eq!(tracks[0].language_code, "es");

            let lines = source.fetch("abc", &tracks[0]).await.unwrap();
            timed.assert();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].text, "hola mundo");
            assert_eq!(lines[0].start, 61.0);
        }

        #[tokio::test]
        async fn watch_page_without_captions_is_disabled() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/watch");
                then.status(200)
                    .body(r#"ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"}};"#);
            });

            let err = transcripts_for(&server).list("abc").await.unwrap_err();
            assert!(matches!(err, TranscriptError::Disabled(id) if id == "abc"));
        }

        #[tokio::test]
        async fn failed_caption_fetch_is_transport_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/api/timedtext");
                then.status(404);
            });
            let track = TranscriptTrack {
                language_code: "en".to_string(),
                language: "English".to_string(),
                generated: false,
                base_url: server.url("/api/timedtext?v=abc&lang=en"),
            };

            let err = transcripts_for(&server).fetch("abc", &track).await.unwrap_err();
            assert!(matches!(err, TranscriptError::Http(_)));
        }
    }
}
