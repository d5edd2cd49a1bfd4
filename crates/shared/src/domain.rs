use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque conversation identifier shared by the `chat_id` query parameter and
/// JSON field of every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    /// Generates a fresh random (version 4) identifier without contacting the
    /// backend.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl Device {
    pub const ALL: [Device; 3] = [Device::Auto, Device::Cpu, Device::Gpu];

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }

    /// Device reported by the backend; missing or unknown values mean `auto`.
    pub fn from_status(value: Option<&str>) -> Self {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown compute device '{0}' (expected auto, cpu or gpu)")]
pub struct UnknownDevice(pub String);

impl FromStr for Device {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "gpu" => Ok(Device::Gpu),
            _ => Err(UnknownDevice(s.to_string())),
        }
    }
}

/// Author of a message. The backend capitalizes its tags ("User", "Bot"), and
/// older front ends used "You", so matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn display_name(self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "Bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl TryFrom<String> for Sender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "you" => Ok(Sender::User),
            "assistant" | "bot" => Ok(Sender::Assistant),
            _ => Err(format!("unknown message sender '{value}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_chat_ids_are_version_4_uuids() {
        let id = ChatId::generate();
        let parsed = Uuid::parse_str(id.as_str()).expect("uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
        assert_ne!(id, ChatId::generate());
    }

    #[test]
    fn device_falls_back_to_auto() {
        assert_eq!(Device::from_status(None), Device::Auto);
        assert_eq!(Device::from_status(Some("tpu")), Device::Auto);
        assert_eq!(Device::from_status(Some("GPU")), Device::Gpu);
        assert!("npu".parse::<Device>().is_err());
    }

    #[test]
    fn unknown_device_is_a_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new("npu".parse::<Device>().expect_err("unknown device"));
        assert_eq!(
            err.to_string(),
            "unknown compute device 'npu' (expected auto, cpu or gpu)"
        );
    }

    #[test]
    fn sender_tags_match_backend_spellings() {
        let parsed: Vec<Sender> =
            serde_json::from_str(r#"["User", "Bot", "assistant", "you"]"#).expect("senders");
        assert_eq!(
            parsed,
            vec![Sender::User, Sender::Assistant, Sender::Assistant, Sender::User]
        );
        assert!(serde_json::from_str::<Sender>(r#""system""#).is_err());
        assert_eq!(
            serde_json::to_string(&Sender::Assistant).expect("json"),
            r#""assistant""#
        );
    }
}
