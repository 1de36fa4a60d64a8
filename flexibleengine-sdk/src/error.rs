//! SDK error types

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {}", format_api_message(.code, .message))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("timeout while waiting for state to become '{target}' (last state: '{last_state}', timeout: {timeout:?})")]
    Timeout {
        target: String,
        last_state: String,
        timeout: Duration,
    },
    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Whether the error is a 404 from the service
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Build an error from a non-success HTTP status and the raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (code, message) = parse_error_body(body);
        match status {
            401 | 403 => ClientError::AuthFailed(message),
            404 => ClientError::NotFound(message),
            _ => ClientError::Api {
                status,
                code,
                message,
            },
        }
    }
}

fn format_api_message(code: &Option<String>, message: &str) -> String {
    match code {
        Some(code) => format!("{}: {}", code, message),
        None => message.to_string(),
    }
}

#[derive(Deserialize)]
struct FlatError {
    #[serde(alias = "error_code", alias = "errorCode")]
    code: Option<serde_json::Value>,
    #[serde(alias = "error_msg", alias = "errorMessage", alias = "error_message")]
    message: Option<String>,
}

#[derive(Deserialize)]
struct WrappedError {
    #[serde(alias = "NeutronError", alias = "badRequest", alias = "itemNotFound")]
    error: FlatError,
}

/// Extract `(code, message)` from the various error envelopes the services use.
///
/// Falls back to the raw body when none of the known shapes match.
pub fn parse_error_body(body: &str) -> (Option<String>, String) {
    let extract = |e: FlatError| -> Option<(Option<String>, String)> {
        let message = e.message?;
        let code = e.code.map(|c| match c {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        Some((code, message))
    };

    if let Ok(wrapped) = serde_json::from_str::<WrappedError>(body) {
        if let Some(found) = extract(wrapped.error) {
            return found;
        }
    }
    if let Ok(flat) = serde_json::from_str::<FlatError>(body) {
        if let Some(found) = extract(flat) {
            return found;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        (None, "empty response body".to_string())
    } else {
        (None, trimmed.to_string())
    }
}
