use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The backend answered with a non-2xx status.
    HttpStatus,
    /// The request never produced a response (connect, timeout, reset).
    Network,
    /// A 2xx response whose body did not match the expected shape.
    Decode,
}

/// The single failure shape every remote operation resolves to.
///
/// `message` is the response body for [`ErrorCode::HttpStatus`] and the
/// transport-level description otherwise; `Display` prints it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TransportError {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: None,
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::HttpStatus,
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Decode, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_bare_message() {
        let err = TransportError::http_status(503, "model busy");
        assert_eq!(err.to_string(), "model busy");
        assert_eq!(err.status, Some(503));
        assert_eq!(err.code, ErrorCode::HttpStatus);
    }
}
