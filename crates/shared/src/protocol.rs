use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ChatId, Device, Sender};

/// Row of `GET /chats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Row of `GET /history?chat_id=ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub text: String,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tps: Option<f64>,
}

/// Body of `GET /status?chat_id=ID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub loaded: bool,
}

/// Body of `POST /load` and `POST /unload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelToggleRequest {
    pub chat_id: ChatId,
    pub model: String,
    pub device: Device,
}

/// Query string of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatQuery {
    pub model: String,
    pub device: Device,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub chat_id: ChatId,
    pub message: String,
}

/// Reply of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tps: Option<f64>,
}

/// Accepts RFC 3339 as well as the offset-less ISO-8601 form the backend
/// writes (`2024-05-01T12:30:00.123456`), which is UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn history_entry_accepts_backend_shape() {
        let entry: HistoryEntry = serde_json::from_str(
            r#"{"sender":"Bot","text":"hello","timestamp":"2024-05-01T12:30:00.123456"}"#,
        )
        .expect("history entry");
        assert_eq!(entry.sender, Sender::Assistant);
        let timestamp = entry.timestamp.expect("timestamp");
        assert_eq!((timestamp.year(), timestamp.hour()), (2024, 12));
        assert_eq!(entry.tokens, None);
    }

    #[test]
    fn history_entry_tolerates_null_timestamp_and_metrics() {
        let entry: HistoryEntry = serde_json::from_str(
            r#"{"sender":"assistant","text":"x","timestamp":null,"tokens":3,"time_s":0.5,"tps":6.0}"#,
        )
        .expect("history entry");
        assert_eq!(entry.timestamp, None);
        assert_eq!(entry.tokens, Some(3));
    }

    #[test]
    fn rfc3339_timestamps_keep_their_offset() {
        let parsed = parse_timestamp("2024-05-01T14:30:00+02:00").expect("timestamp");
        assert_eq!(parsed.hour(), 12);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn status_defaults_to_not_loaded() {
        let status: StatusResponse = serde_json::from_str("{}").expect("status");
        assert!(!status.loaded);
        assert_eq!(status.model, None);
    }

    #[test]
    fn toggle_request_serializes_device_lowercase() {
        let body = serde_json::to_value(ModelToggleRequest {
            chat_id: ChatId::from("c1"),
            model: "m1".into(),
            device: Device::Cpu,
        })
        .expect("json");
        assert_eq!(
            body,
            serde_json::json!({"chat_id": "c1", "model": "m1", "device": "cpu"})
        );
    }
}
