//! Adapter error types.
//!
//! Every tool invocation either returns a shaped JSON value or one
//! [`AdapterError`].  Callers that only care about the broad failure class
//! use [`AdapterError::kind`], which folds the variants into the four kinds
//! a caller can act on: configuration, validation, transport and timeout.

use serde::Serialize;
use serde_json::{Value, json};

/// Unified error type for toolhub adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A required credential or setting is missing or malformed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The requested tool does not exist on this adapter.
    #[error("tool not found: `{tool_name}` on adapter `{adapter_id}`")]
    ToolNotFound {
        adapter_id: String,
        tool_name: String,
    },

    /// The parameters supplied to a tool are invalid.
    #[error("invalid parameters for tool `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// The upstream API answered with a status outside 2xx.
    #[error("upstream returned {status} for tool `{tool_name}`: {body}")]
    Upstream {
        tool_name: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("network error for tool `{tool_name}`: {reason}")]
    Network { tool_name: String, reason: String },

    /// The round trip exceeded its time limit.
    #[error("timeout after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal adapter error: {0}")]
    Internal(String),
}

/// Broad failure class of an [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed credential / setting, raised before any request.
    Configuration,
    /// Bad or missing caller parameters, raised before any request.
    Validation,
    /// Upstream non-2xx response or a failed connection.
    Transport,
    /// The round trip exceeded its bound.
    Timeout,
    /// Decoding or other local failures.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Validation => write!(f, "validation"),
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl AdapterError {
    /// Shorthand for [`AdapterError::InvalidParams`].
    pub fn invalid(tool_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool_name: tool_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::ToolNotFound { .. } | Self::InvalidParams { .. } => ErrorKind::Validation,
            Self::Upstream { .. } | Self::Network { .. } => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::SerializationError(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The upstream HTTP status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured form used for fan-out slots and the CLI.
    ///
    /// Upstream bodies that are JSON are embedded as JSON, anything else as
    /// a string.
    pub fn to_json(&self) -> Value {
        let mut out = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Upstream { status, body, .. } = self {
            out["status"] = json!(status);
            out["body"] = serde_json::from_str::<Value>(body).unwrap_or_else(|_| json!(body));
        }
        out
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_four_caller_classes() {
        assert_eq!(
            AdapterError::ConfigError("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            AdapterError::invalid("t", "missing `id`").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AdapterError::Upstream {
                tool_name: "t".into(),
                status: 404,
                body: "{}".into()
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            AdapterError::Timeout {
                seconds: 30,
                reason: "slow".into()
            }
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn upstream_json_keeps_status_and_body() {
        let err = AdapterError::Upstream {
            tool_name: "stripe_get_customer".into(),
            status: 404,
            body: r#"{"error":{"message":"No such customer"}}"#.into(),
        };
        let v = err.to_json();
        assert_eq!(v["kind"], "transport");
        assert_eq!(v["status"], 404);
        assert_eq!(v["body"]["error"]["message"], "No such customer");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn non_json_body_is_kept_as_text() {
        let err = AdapterError::Upstream {
            tool_name: "t".into(),
            status: 502,
            body: "Bad Gateway".into(),
        };
        assert_eq!(err.to_json()["body"], "Bad Gateway");
        assert!(err.to_string().contains("502"));
    }
}
