//! Error types for the admin console session client.

use crate::constants::GENERIC_ERROR_MESSAGE;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for session client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error body returned by the server on a non-2xx response.
///
/// The API answers with JSON such as `{"message": "...", "errors": {"email": ["..."]}}`
/// but proxies and crashes may produce plain text, so the raw body is kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorPayload {
    /// JSON error body.
    Json(Value),
    /// Non-JSON body (plain text or HTML).
    Text(String),
    /// Empty body.
    Empty,
}

impl ErrorPayload {
    /// Parse a raw response body.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        serde_json::from_str(trimmed).map_or_else(|_| Self::Text(trimmed.to_string()), Self::Json)
    }

    /// Server-provided message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Json(value) => value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty()),
            Self::Text(text) => Some(text.as_str()),
            Self::Empty => None,
        }
    }

    /// Field validation errors (`{"errors": {"field": ["msg", ...]}}`).
    ///
    /// A single string per field is accepted as well.
    #[must_use]
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let Self::Json(value) = self else {
            return BTreeMap::new();
        };
        let Some(errors) = value.get("errors").and_then(Value::as_object) else {
            return BTreeMap::new();
        };

        errors
            .iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    Value::String(message) => vec![message.clone()],
                    _ => Vec::new(),
                };
                (field.clone(), messages)
            })
            .collect()
    }
}

/// Errors surfaced by the session client.
///
/// Network failures (no response) are kept apart from server rejections
/// (status present) so callers can decide whether to retry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// No response was received (connection refused, DNS, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered 429. Never intercepted by the refresh protocol.
    #[error("Too many attempts")]
    RateLimited {
        /// Error body returned by the server.
        payload: ErrorPayload,
    },

    /// The server answered with any other non-2xx status.
    #[error("API error (status {status})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the server.
        payload: ErrorPayload,
    },

    /// Input rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Two-factor verification attempted without a pending challenge.
    #[error("No pending two-factor challenge")]
    NoPendingChallenge,

    /// A successful response did not have the expected shape.
    #[error("Response parsing failed: {0}")]
    Decode(String),

    /// A request body could not be serialized.
    #[error("Request encoding failed: {0}")]
    Encode(String),

    /// The credential store could not be read or written.
    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// HTTP status of the failure, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for a 401 answer.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Server payload, if the server answered.
    #[must_use]
    pub const fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Self::RateLimited { payload } | Self::Api { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Message suitable for display.
    ///
    /// Prefers the server-provided message and falls back to
    /// [`GENERIC_ERROR_MESSAGE`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use admin_console_client::{ClientError, ErrorPayload};
    /// let err = ClientError::Api {
    ///     status: 422,
    ///     payload: ErrorPayload::from_body(r#"{"message":"Email taken"}"#),
    /// };
    /// assert_eq!(err.user_message(), "Email taken");
    /// ```
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited { payload } | Self::Api { payload, .. } => payload
                .message()
                .unwrap_or(GENERIC_ERROR_MESSAGE)
                .to_string(),
            Self::Validation(message) => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_json_body() {
        let payload = ErrorPayload::from_body(r#"{"message":"Invalid credentials"}"#);
        assert_eq!(payload.message(), Some("Invalid credentials"));
    }

    #[test]
    fn test_payload_from_text_and_empty_body() {
        assert_eq!(
            ErrorPayload::from_body("Bad Gateway"),
            ErrorPayload::Text("Bad Gateway".to_string())
        );
        assert_eq!(ErrorPayload::from_body("  "), ErrorPayload::Empty);
        assert_eq!(ErrorPayload::Empty.message(), None);
    }

    #[test]
    fn test_field_errors() {
        let payload = ErrorPayload::from_body(
            r#"{"message":"The given data was invalid.","errors":{"email":["taken","invalid"],"age":"too low"}}"#,
        );
        let errors = payload.field_errors();
        assert_eq!(errors["email"], vec!["taken", "invalid"]);
        assert_eq!(errors["age"], vec!["too low"]);
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let err = ClientError::Api {
            status: 500,
            payload: ErrorPayload::Empty,
        };
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(
            ClientError::Network("connection refused".to_string()).user_message(),
            GENERIC_ERROR_MESSAGE
        );
    }

    #[test]
    fn test_status_accessors() {
        let unauthorized = ClientError::Api {
            status: 401,
            payload: ErrorPayload::Empty,
        };
        assert!(unauthorized.is_unauthorized());
        assert_eq!(unauthorized.status(), Some(401));

        let limited = ClientError::RateLimited {
            payload: ErrorPayload::Empty,
        };
        assert!(!limited.is_unauthorized());
        assert_eq!(limited.status(), Some(429));
        assert_eq!(ClientError::NoPendingChallenge.status(), None);
    }
}
