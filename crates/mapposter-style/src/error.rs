use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleErrorCode {
    BackendUnavailable,
    CredentialMissing,
    InputMissing,
    RateLimited,
    InputModalityRejected,
    Network,
    Backend,
    ExtractionFailure,
    Io,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleError {
    pub code: StyleErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl StyleError {
    pub fn new(code: StyleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn as_compact_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"code\":\"backend\",\"message\":\"{}\"}}",
                self.message.replace('\"', "\\\"")
            )
        })
    }
}

impl Display for StyleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for StyleError {}

/// Classify a backend failure from its HTTP status (if any) and message text.
pub fn classify_backend_failure(status: Option<u16>, message: &str) -> StyleErrorCode {
    let lowered = message.to_ascii_lowercase();
    if status == Some(429) || lowered.contains("429") || lowered.contains("throttl") {
        return StyleErrorCode::RateLimited;
    }
    let input_status = matches!(status, None | Some(400) | Some(422));
    if input_status
        && (lowered.contains("image")
            || lowered.contains("unexpected")
            || lowered.contains("invalid"))
    {
        return StyleErrorCode::InputModalityRejected;
    }
    StyleErrorCode::Backend
}
