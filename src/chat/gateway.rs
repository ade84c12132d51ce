use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use url::Url;

use crate::{
    config::GatewayConfig,
    domain::{MediaKind, Message, UrlAnnotation},
};

use super::{ChatClient, ChatError, PageRequest, ResolvedChannel};

/// HTTP adapter for a Bot-API-style history bridge.
///
/// Every method is `POST {base}/{method}` with a JSON body and a JSON
/// envelope in return, except a successful `downloadMedia`, which streams
/// the raw file.
pub struct GatewayClient {
    http: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(http: Client, config: GatewayConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self, method: &str) -> Result<Url, ChatError> {
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(method).map_err(|err| ChatError::Api {
            code: 0,
            description: format!("bad gateway endpoint for {method}: {err}"),
        })
    }

    async fn post(&self, method: &str, body: &impl Serialize) -> Result<reqwest::Response, ChatError> {
        let response = self
            .http
            .post(self.endpoint(method)?)
            .bearer_auth(&self.config.token)
            .timeout(self.config.request_timeout)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, ChatError> {
        let response = self.post(method, body).await?;
        let status = response.status();
        let retry_header = retry_after_header(&response);
        let bytes = response.bytes().await?;
        decode_envelope(status, retry_header, &bytes)
    }
}

#[async_trait]
impl ChatClient for GatewayClient {
    async fn resolve_channel(&self, handle: &str) -> Result<ResolvedChannel, ChatError> {
        let chat: WireChat = match self.call("resolveChat", &ResolveParams { chat: handle }).await {
            Ok(chat) => chat,
            Err(err) if is_missing_chat(&err) => {
                return Err(ChatError::ChannelNotFound(handle.to_string()))
            }
            Err(err) => return Err(err),
        };
        Ok(ResolvedChannel {
            id: chat.id,
            handle: handle.to_string(),
            title: chat
                .title
                .or(chat.username)
                .unwrap_or_else(|| handle.to_string()),
        })
    }

    async fn history_page(
        &self,
        channel: &ResolvedChannel,
        page: PageRequest,
    ) -> Result<Vec<Message>, ChatError> {
        let params = HistoryParams {
            chat_id: channel.id,
            offset_date: page.offset_date.timestamp(),
            offset_id: page.offset_id,
            limit: page.limit,
        };
        let messages: Vec<WireMessage> = self.call("getHistory", &params).await?;
        Ok(messages.into_iter().map(Message::from).collect())
    }

    async fn get_message(
        &self,
        channel: &ResolvedChannel,
        message_id: i64,
    ) -> Result<Option<Message>, ChatError> {
        let params = MessageParams {
            chat_id: channel.id,
            message_id,
        };
        let message: Option<WireMessage> = self.call("getMessage", &params).await?;
        Ok(message.map(Message::from))
    }

    async fn download_media(
        &self,
        channel: &ResolvedChannel,
        message: &Message,
        dest: &Path,
    ) -> Result<u64, ChatError> {
        if message.media.is_none() {
            return Err(ChatError::NoMedia(message.id));
        }
        let params = MessageParams {
            chat_id: channel.id,
            message_id: message.id,
        };
        let response = self.post("downloadMedia", &params).await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if !status.is_success() || is_json {
            let retry_header = retry_after_header(&response);
            let bytes = response.bytes().await?;
            return decode_envelope::<serde_json::Value>(status, retry_header, &bytes).and_then(
                |_| {
                    Err(ChatError::Api {
                        code: i64::from(status.as_u16()),
                        description: "downloadMedia returned JSON instead of file content"
                            .to_string(),
                    })
                },
            );
        }

        let partial = partial_path(dest);
        let written = async {
            let mut file = fs::File::create(&partial).await?;
            let mut written = 0u64;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, ChatError>(written)
        }
        .await;

        match written {
            Ok(written) => {
                fs::rename(&partial, dest).await?;
                Ok(written)
            }
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    retry_header: Option<u64>,
    body: &[u8],
) -> Result<T, ChatError> {
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(_) if status == StatusCode::TOO_MANY_REQUESTS => {
            return Err(ChatError::RateLimited {
                seconds: retry_header.unwrap_or(1),
            })
        }
        Err(err) if status.is_success() => return Err(ChatError::Decode(err)),
        Err(_) => {
            return Err(ChatError::Api {
                code: i64::from(status.as_u16()),
                description: String::from_utf8_lossy(body).trim().to_string(),
            })
        }
    };

    if envelope.ok {
        // A null result is only valid where the caller asked for an Option.
        return match envelope.result {
            Some(result) => Ok(result),
            None => serde_json::from_value(serde_json::Value::Null).map_err(|_| ChatError::Api {
                code: i64::from(status.as_u16()),
                description: "response marked ok but carried no result".to_string(),
            }),
        };
    }

    let retry_after = envelope
        .parameters
        .and_then(|p| p.retry_after)
        .or(retry_header);
    let code = envelope
        .error_code
        .unwrap_or_else(|| i64::from(status.as_u16()));
    let description = envelope.description.unwrap_or_default();

    if let Some(seconds) = retry_after {
        return Err(ChatError::RateLimited { seconds });
    }
    if code == 429 {
        return Err(ChatError::RateLimited { seconds: 1 });
    }
    if description.to_ascii_uppercase().contains("FILE_REFERENCE") {
        return Err(ChatError::FileReferenceExpired);
    }
    Err(ChatError::Api { code, description })
}

fn is_missing_chat(err: &ChatError) -> bool {
    const MARKERS: [&str; 5] = [
        "CHAT_NOT_FOUND",
        "USERNAME_NOT_OCCUPIED",
        "USERNAME_INVALID",
        "CHANNEL_PRIVATE",
        "CHANNEL_INVALID",
    ];
    match err {
        ChatError::Api { code, description } => {
            let upper = description.to_ascii_uppercase().replace(' ', "_");
            *code == 404 || MARKERS.iter().any(|m| upper.contains(m))
        }
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ResolveParams<'a> {
    chat: &'a str,
}

#[derive(Debug, Serialize)]
struct HistoryParams {
    chat_id: i64,
    offset_date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset_id: Option<i64>,
    limit: u32,
}

#[derive(Debug, Serialize)]
struct MessageParams {
    chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    id: i64,
    title: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    date: DateTime<Utc>,
    sender_id: Option<i64>,
    text: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    entities: Vec<WireEntity>,
    #[serde(default)]
    caption_entities: Vec<WireEntity>,
    #[serde(default)]
    media: MediaKind,
}

#[derive(Debug, Deserialize)]
struct WireEntity {
    #[serde(rename = "type")]
    kind: String,
    offset: usize,
    length: usize,
    url: Option<String>,
}

impl WireEntity {
    fn into_annotation(self) -> Option<UrlAnnotation> {
        match self.kind.as_str() {
            "text_link" => self.url.map(|url| UrlAnnotation::DisplayTextLink { url }),
            "url" => Some(UrlAnnotation::AutoLinkedSpan {
                offset: self.offset,
                length: self.length,
            }),
            _ => None,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let (text, entities) = match wire.text {
            Some(text) => (text, wire.entities),
            None => (wire.caption.unwrap_or_default(), wire.caption_entities),
        };
        Message {
            id: wire.message_id,
            timestamp: wire.date,
            sender_id: wire.sender_id,
            text,
            annotations: entities
                .into_iter()
                .filter_map(WireEntity::into_annotation)
                .collect(),
            media: wire.media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_successful_history() {
        let body = br#"{"ok":true,"result":[{"message_id":7,"date":1762646400,"sender_id":42,
            "caption":"see https://example.com","caption_entities":[{"type":"url","offset":4,"length":19},
            {"type":"bold","offset":0,"length":3}],"media":"photo"}]}"#;
        let messages: Vec<WireMessage> = decode_envelope(StatusCode::OK, None, body).unwrap();
        let message = Message::from(messages.into_iter().next().unwrap());
        assert_eq!(message.id, 7);
        assert_eq!(message.text, "see https://example.com");
        assert_eq!(message.media, MediaKind::Photo);
        assert_eq!(
            message.annotations,
            vec![UrlAnnotation::AutoLinkedSpan {
                offset: 4,
                length: 19
            }]
        );
        assert_eq!(message.timestamp.to_rfc3339(), "2025-11-09T00:00:00+00:00");
    }

    #[test]
    fn null_result_decodes_as_absent_message() {
        let body = br#"{"ok":true,"result":null}"#;
        let message: Option<WireMessage> = decode_envelope(StatusCode::OK, None, body).unwrap();
        assert!(message.is_none());
        assert!(decode_envelope::<WireChat>(StatusCode::OK, None, body).is_err());
    }

    #[test]
    fn retry_after_maps_to_rate_limit() {
        let body = br#"{"ok":false,"error_code":420,"description":"FLOOD_WAIT","parameters":{"retry_after":30}}"#;
        let err = decode_envelope::<serde_json::Value>(StatusCode::OK, None, body).unwrap_err();
        assert!(matches!(err, ChatError::RateLimited { seconds: 30 }));
    }

    #[test]
    fn bare_429_uses_header() {
        let err = decode_envelope::<serde_json::Value>(
            StatusCode::TOO_MANY_REQUESTS,
            Some(12),
            b"slow down",
        )
        .unwrap_err();
        assert!(matches!(err, ChatError::RateLimited { seconds: 12 }));
    }

    #[test]
    fn file_reference_description_is_recognized() {
        let body = br#"{"ok":false,"error_code":400,"description":"FILE_REFERENCE_EXPIRED"}"#;
        let err = decode_envelope::<serde_json::Value>(StatusCode::BAD_REQUEST, None, body)
            .unwrap_err();
        assert!(matches!(err, ChatError::FileReferenceExpired));
    }

    #[test]
    fn missing_chat_detection() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = decode_envelope::<serde_json::Value>(StatusCode::BAD_REQUEST, None, body)
            .unwrap_err();
        assert!(is_missing_chat(&err));
        assert!(!is_missing_chat(&ChatError::FileReferenceExpired));
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/a/Images/42.jpg")),
            PathBuf::from("/a/Images/42.jpg.part")
        );
    }

    mod http {
        use std::time::Duration;

        use chrono::TimeZone;
        use httpmock::prelude::*;
        use serde_json::json;

        use super::*;

        fn client_for(server: &MockServer) -> GatewayClient {
            GatewayClient::new(
                Client::new(),
                GatewayConfig {
                    base_url: Url::parse(&server.base_url()).unwrap(),
                    token: "secret".to_string(),
                    page_size: 100,
                    request_timeout: Duration::from_secs(5),
                },
            )
        }

        fn channel() -> ResolvedChannel {
            ResolvedChannel {
                id: -1001,
                handle: "rustlang".to_string(),
                title: "Rust".to_string(),
            }
        }

        fn photo_message(id: i64) -> Message {
            Message {
                id,
                timestamp: Utc.with_ymd_and_hms(2025, 11, 9, 12, 0, 0).unwrap(),
                sender_id: None,
                text: String::new(),
                annotations: Vec::new(),
                media: MediaKind::Photo,
            }
        }

        #[tokio::test]
        async fn resolves_channel_with_bearer_token() {
            let server = MockServer::start();
            let resolve = server.mock(|when, then| {
                when.method(POST)
                    .path("/resolveChat")
                    .header("authorization", "Bearer secret")
                    .body_includes("\"chat\":\"rustlang\"");
                then.status(200)
                    .json_body(json!({"ok": true, "result": {"id": -1001, "username": "rustlang"}}));
            });

            let resolved = client_for(&server).resolve_channel("rustlang").await.unwrap();
            resolve.assert();
            assert_eq!(resolved.id, -1001);
            assert_eq!(resolved.title, "rustlang");
        }

        #[tokio::test]
        async fn unknown_chat_maps_to_channel_not_found() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/resolveChat");
                then.status(400).json_body(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found"
                }));
            });

            let err = client_for(&server).resolve_channel("ghost").await.unwrap_err();
            assert!(matches!(err, ChatError::ChannelNotFound(handle) if handle == "ghost"));
        }

        #[tokio::test]
        async fn history_request_carries_offsets() {
            let server = MockServer::start();
            let history = server.mock(|when, then| {
                when.method(POST)
                    .path("/getHistory")
                    .body_includes("\"chat_id\":-1001")
                    .body_includes("\"offset_id\":8")
                    .body_includes("\"limit\":100");
                then.status(200).json_body(json!({
                    "ok": true,
                    "result": [{"message_id": 7, "date": 1762646400, "text": "hi"}]
                }));
            });

            let page = PageRequest {
                offset_date: Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap(),
                offset_id: Some(8),
                limit: 100,
            };
            let messages = client_for(&server).history_page(&channel(), page).await.unwrap();
            history.assert();
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].id, 7);
            assert_eq!(messages[0].text, "hi");
        }

        #[tokio::test]
        async fn retry_after_in_envelope_is_rate_limit() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/getHistory");
                then.status(429).json_body(json!({
                    "ok": false,
                    "error_code": 429,
                    "description": "Too Many Requests: retry after 30",
                    "parameters": {"retry_after": 30}
                }));
            });

            let page = PageRequest {
                offset_date: Utc.with_ymd_and_hms(2025, 11, 10, 0, 0, 0).unwrap(),
                offset_id: None,
                limit: 100,
            };
            let err = client_for(&server)
                .history_page(&channel(), page)
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::RateLimited { seconds: 30 }));
        }

        #[tokio::test]
        async fn plain_429_uses_retry_after_header() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/resolveChat");
                then.status(429).header("retry-after", "12").body("slow down");
            });

            let err = client_for(&server).resolve_channel("rustlang").await.unwrap_err();
            assert!(matches!(err, ChatError::RateLimited { seconds: 12 }));
        }

        #[tokio::test]
        async fn download_streams_file_and_leaves_no_partial() {
            let server = MockServer::start();
            let download = server.mock(|when, then| {
                when.method(POST)
                    .path("/downloadMedia")
                    .body_includes("\"message_id\":42");
                then.status(200)
                    .header("content-type", "application/octet-stream")
                    .body(vec![7u8; 2048]);
            });
            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("42.jpg");

            let written = client_for(&server)
                .download_media(&channel(), &photo_message(42), &dest)
                .await
                .unwrap();
            download.assert();
            assert_eq!(written, 2048);
            assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 2048]);
            assert!(!partial_path(&dest).exists());
        }

        #[tokio::test]
        async fn expired_reference_writes_nothing() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/downloadMedia");
                then.status(400).json_body(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "FILE_REFERENCE_EXPIRED"
                }));
            });
            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("42.jpg");

            let err = client_for(&server)
                .download_media(&channel(), &photo_message(42), &dest)
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::FileReferenceExpired));
            assert!(!dest.exists());
            assert!(!partial_path(&dest).exists());
        }

        #[tokio::test]
        async fn json_body_on_download_is_an_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/downloadMedia");
                then.status(200).json_body(json!({"ok": true, "result": true}));
            });
            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("42.jpg");

            let err = client_for(&server)
                .download_media(&channel(), &photo_message(42), &dest)
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::Api { code: 200, .. }));
            assert!(!dest.exists());
        }

        #[tokio::test]
        async fn message_without_media_is_not_requested() {
            let server = MockServer::start();
            let download = server.mock(|when, then| {
                when.method(POST).path("/downloadMedia");
                then.status(200).body("unused");
            });
            let mut message = photo_message(5);
            message.media = MediaKind::None;
            let dir = tempfile::tempdir().unwrap();

            let err = client_for(&server)
                .download_media(&channel(), &message, &dir.path().join("5.jpg"))
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::NoMedia(5)));
            download.assert_calls(0);
        }
    }
}
