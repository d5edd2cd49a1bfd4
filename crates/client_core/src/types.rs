use std::fmt;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ChatId, Device, Sender},
    protocol::{ChatResponse, ChatSummary, HistoryEntry, StatusResponse},
};

/// Directory entry for a known conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ChatId,
    pub title: Option<String>,
    pub model: Option<String>,
    pub device: Option<Device>,
}

impl Conversation {
    pub fn new(id: ChatId) -> Self {
        Self {
            id,
            title: None,
            model: None,
            device: None,
        }
    }

    /// Title when the backend has one, otherwise the raw id.
    pub fn label(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => self.id.as_str(),
        }
    }
}

impl From<ChatSummary> for Conversation {
    fn from(value: ChatSummary) -> Self {
        Self {
            id: value.chat_id,
            title: value.title,
            model: value.model.filter(|model| !model.is_empty()),
            device: value.device.and_then(|device| device.parse().ok()),
        }
    }
}

/// Performance figures the backend reports for one generated reply. The client
/// treats them as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationMetrics {
    pub tokens: Option<u64>,
    pub time_s: Option<f64>,
    pub tps: Option<f64>,
}

impl GenerationMetrics {
    /// `None` when the backend reported none of the three figures.
    pub fn from_parts(tokens: Option<u64>, time_s: Option<f64>, tps: Option<f64>) -> Option<Self> {
        if tokens.is_none() && time_s.is_none() && tps.is_none() {
            return None;
        }
        Some(Self {
            tokens,
            time_s,
            tps,
        })
    }
}

impl fmt::Display for GenerationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(time_s) = self.time_s {
            parts.push(format!("Time: {time_s:.2}s"));
        }
        if let Some(tokens) = self.tokens {
            parts.push(format!("Tokens: {tokens}"));
        }
        if let Some(tps) = self.tps {
            parts.push(format!("TPS: {tps:.2}"));
        }
        f.write_str(&parts.join(" | "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Only ever set on assistant messages.
    pub metrics: Option<GenerationMetrics>,
    /// Local id pairing an outgoing message with its reply; never sent.
    pub(crate) request_id: Option<u64>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            timestamp: None,
            metrics: None,
            request_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
            timestamp: None,
            metrics: None,
            request_id: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<GenerationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn for_request(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

impl From<HistoryEntry> for Message {
    fn from(value: HistoryEntry) -> Self {
        let metrics = match value.sender {
            Sender::Assistant => GenerationMetrics::from_parts(value.tokens, value.time_s, value.tps),
            Sender::User => None,
        };
        Self {
            sender: value.sender,
            text: value.text,
            timestamp: value.timestamp,
            metrics,
            request_id: None,
        }
    }
}

/// Last-known model state of a conversation as reported by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatStatus {
    pub model: Option<String>,
    pub device: Device,
    pub loaded: bool,
}

impl From<StatusResponse> for ChatStatus {
    fn from(value: StatusResponse) -> Self {
        Self {
            model: value.model.filter(|model| !model.is_empty()),
            device: Device::from_status(value.device.as_deref()),
            loaded: value.loaded,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub metrics: Option<GenerationMetrics>,
}

impl From<ChatResponse> for ChatReply {
    fn from(value: ChatResponse) -> Self {
        Self {
            text: value.response,
            metrics: GenerationMetrics::from_parts(value.tokens, value.time_s, value.tps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_id() {
        let mut conversation = Conversation::new(ChatId::from("abc"));
        assert_eq!(conversation.label(), "abc");
        conversation.title = Some("  ".into());
        assert_eq!(conversation.label(), "abc");
        conversation.title = Some("hello there".into());
        assert_eq!(conversation.label(), "hello there");
    }

    #[test]
    fn metrics_line_matches_history_footer() {
        let metrics = GenerationMetrics::from_parts(Some(3), Some(0.5), Some(6.0)).expect("metrics");
        assert_eq!(metrics.to_string(), "Time: 0.50s | Tokens: 3 | TPS: 6.00");
        assert_eq!(GenerationMetrics::from_parts(None, None, None), None);
    }

    #[test]
    fn user_history_rows_never_carry_metrics() {
        let message = Message::from(HistoryEntry {
            sender: Sender::User,
            text: "hi".into(),
            timestamp: None,
            tokens: Some(1),
            time_s: None,
            tps: None,
        });
        assert_eq!(message.metrics, None);
    }

    #[test]
    fn status_with_empty_model_keeps_selection_open() {
        let status = ChatStatus::from(StatusResponse {
            model: Some(String::new()),
            device: Some("quantum".into()),
            loaded: true,
        });
        assert_eq!(status.model, None);
        assert_eq!(status.device, Device::Auto);
        assert!(status.loaded);
    }
}
