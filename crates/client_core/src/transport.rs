//! Typed access to the chat backend's HTTP surface.
//!
//! Every operation performs exactly one round-trip and never retries; the
//! write operations (`set_model_loaded`, `send_message`, `clear_all`) are not
//! safe to replay blindly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ChatId, Device},
    error::TransportError,
    protocol::{
        ChatQuery, ChatRequest, ChatResponse, ChatSummary, HistoryEntry, ModelToggleRequest,
        StatusResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::types::{ChatReply, ChatStatus, Conversation, Message};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, TransportError>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError>;
    async fn fetch_history(&self, chat_id: &ChatId) -> Result<Vec<Message>, TransportError>;
    async fn fetch_status(&self, chat_id: &ChatId) -> Result<ChatStatus, TransportError>;
    /// `desired == true` loads the model, `false` unloads it.
    async fn set_model_loaded(
        &self,
        chat_id: &ChatId,
        model: &str,
        device: Device,
        desired: bool,
    ) -> Result<(), TransportError>;
    async fn send_message(
        &self,
        chat_id: &ChatId,
        model: &str,
        device: Device,
        text: &str,
    ) -> Result<ChatReply, TransportError>;
    /// Deletes every stored message on the backend.
    async fn clear_all(&self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: Url,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl BackendConfig {
    pub fn new(mut base_url: Url) -> Self {
        // Url::join drops the last path segment unless it ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, read_timeout: Duration, write_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }
}

pub struct HttpChatBackend {
    http: Client,
    config: BackendConfig,
}

impl HttpChatBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| TransportError::network(format!("invalid endpoint '{path}': {err}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        chat_id: Option<&ChatId>,
    ) -> Result<T, TransportError> {
        let mut request = self
            .http
            .get(self.endpoint(path)?)
            .timeout(self.config.read_timeout);
        if let Some(chat_id) = chat_id {
            request = request.query(&[("chat_id", chat_id.as_str())]);
        }
        debug!(path, "transport: GET");
        let response = dispatch(request).await?;
        decode_json(response).await
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, TransportError> {
        debug!(path, "transport: POST");
        Ok(self
            .http
            .post(self.endpoint(path)?)
            .timeout(self.config.write_timeout))
    }
}

async fn dispatch(request: RequestBuilder) -> Result<Response, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|err| TransportError::network(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            warn!(status = status.as_u16(), error = %err, "transport: failed to read error body");
            String::new()
        }
    };
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    Err(TransportError::http_status(status.as_u16(), message))
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| TransportError::network(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| TransportError::decode(err.to_string()))
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn list_models(&self) -> Result<Vec<String>, TransportError> {
        self.get_json("models", None).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError> {
        let chats: Vec<ChatSummary> = self.get_json("chats", None).await?;
        Ok(chats.into_iter().map(Conversation::from).collect())
    }

    async fn fetch_history(&self, chat_id: &ChatId) -> Result<Vec<Message>, TransportError> {
        let entries: Vec<HistoryEntry> = self.get_json("history", Some(chat_id)).await?;
        Ok(entries.into_iter().map(Message::from).collect())
    }

    async fn fetch_status(&self, chat_id: &ChatId) -> Result<ChatStatus, TransportError> {
        let status: StatusResponse = self.get_json("status", Some(chat_id)).await?;
        Ok(status.into())
    }

    async fn set_model_loaded(
        &self,
        chat_id: &ChatId,
        model: &str,
        device: Device,
        desired: bool,
    ) -> Result<(), TransportError> {
        let path = if desired { "load" } else { "unload" };
        let request = self.post(path)?.json(&ModelToggleRequest {
            chat_id: chat_id.clone(),
            model: model.to_string(),
            device,
        });
        dispatch(request).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        model: &str,
        device: Device,
        text: &str,
    ) -> Result<ChatReply, TransportError> {
        let request = self
            .post("chat")?
            .query(&ChatQuery {
                model: model.to_string(),
                device,
            })
            .json(&ChatRequest {
                chat_id: chat_id.clone(),
                message: text.to_string(),
            });
        let response = dispatch(request).await?;
        let body: ChatResponse = decode_json(response).await?;
        Ok(body.into())
    }

    async fn clear_all(&self) -> Result<(), TransportError> {
        dispatch(self.post("clear_all")?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
