//! Scripted in-memory [`ChatClient`] for tests.

use std::{collections::VecDeque, path::Path};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatClient, ChatError, PageRequest, ResolvedChannel};
use crate::domain::Message;

#[derive(Default)]
pub(crate) struct FakeChat {
    pub known: Vec<String>,
    pub pages: Mutex<VecDeque<Result<Vec<Message>, ChatError>>>,
    pub downloads: Mutex<VecDeque<Result<Vec<u8>, ChatError>>>,
    pub refetched: Mutex<VecDeque<Option<Message>>>,
    pub resolve_calls: Mutex<Vec<String>>,
    pub page_calls: Mutex<Vec<PageRequest>>,
    pub download_calls: Mutex<Vec<i64>>,
    pub refetch_calls: Mutex<Vec<i64>>,
}

impl FakeChat {
    pub fn with_channel(handle: &str) -> Self {
        Self {
            known: vec![handle.to_string()],
            ..Self::default()
        }
    }

    pub fn push_page(&self, page: Result<Vec<Message>, ChatError>) {
        self.pages.lock().push_back(page);
    }

    pub fn push_download(&self, result: Result<Vec<u8>, ChatError>) {
        self.downloads.lock().push_back(result);
    }

    pub fn channel(handle: &str) -> ResolvedChannel {
        ResolvedChannel {
            id: 100,
            handle: handle.to_string(),
            title: format!("{handle} title"),
        }
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn resolve_channel(&self, handle: &str) -> Result<ResolvedChannel, ChatError> {
        self.resolve_calls.lock().push(handle.to_string());
        if self.known.iter().any(|k| k == handle) {
            Ok(Self::channel(handle))
        } else {
            Err(ChatError::ChannelNotFound(handle.to_string()))
        }
    }

    async fn history_page(
        &self,
        _channel: &ResolvedChannel,
        page: PageRequest,
    ) -> Result<Vec<Message>, ChatError> {
        self.page_calls.lock().push(page);
        self.pages.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_message(
        &self,
        _channel: &ResolvedChannel,
        message_id: i64,
    ) -> Result<Option<Message>, ChatError> {
        self.refetch_calls.lock().push(message_id);
        Ok(self.refetched.lock().pop_front().flatten())
    }

    async fn download_media(
        &self,
        _channel: &ResolvedChannel,
        message: &Message,
        dest: &Path,
    ) -> Result<u64, ChatError> {
        self.download_calls.lock().push(message.id);
        let next = self
            .downloads
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(b"media".to_vec()));
        let bytes = next?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}
