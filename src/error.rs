//! Transport-level error taxonomy shared by every layer above the client.

use serde_json::Value;

/// Errors from talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Cannot reach backend at {0}")]
    Connection(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Session expired, please sign in again")]
    Unauthorized,
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },
    #[error("Unexpected response body: {0}")]
    Decode(String),
    #[error("HTTP client error: {0}")]
    Transport(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Local file error: {0}")]
    Io(String),
}

impl ClientError {
    /// Message suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Tries the JSON `message`, `error` (string or `{message}`) and `detail`
/// fields, then the raw text, then the status reason phrase.
pub fn message_from_body(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            match json.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
                Some(Value::Object(obj)) => {
                    if let Some(Value::String(s)) = obj.get("message") {
                        return s.clone();
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('{') && !trimmed.starts_with('<') {
        return trimmed.chars().take(200).collect();
    }

    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Request failed")
        .to_string()
}
