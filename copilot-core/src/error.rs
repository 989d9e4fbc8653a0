//! Error types for copilot-core

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// Main error type for the copilot-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Host storage (kv-store, secret-store, settings) failure
    #[error("storage error: {0}")]
    Storage(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Cloud sync / auth API error
    #[error("cloud error: {0}")]
    Cloud(String),

    /// Entity lookup failed
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation requires an active session
    #[error("no active session")]
    NoActiveSession,

    /// Request payload rejected
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A service the operation depends on was not wired into the host
    #[error("{0} is not available")]
    Unavailable(&'static str),

    /// Host file is held open by another process
    #[error("file is locked: {0}")]
    FileLocked(String),
}

/// Result type alias for copilot-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Re-tag IO/storage failures whose message indicates a held file lock.
    pub fn into_lock_aware(self) -> Self {
        let locked = match &self {
            Error::FileLocked(_) => false,
            Error::Io(io) if io.raw_os_error() == Some(16) => true,
            other => is_file_lock_message(&other.to_string()),
        };
        if locked {
            Error::FileLocked(self.to_string())
        } else {
            self
        }
    }
}

/// Error categories surfaced to the webview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing auth, missing key, bad input
    UserAction,
    /// Provider timeouts, network hiccups
    Transient,
    /// Another process holds a host file
    FileLock,
    /// kv-store / secret-store write failure
    Persistence,
    Unknown,
}

/// Classify an error onto the webview-facing taxonomy.
pub fn classify(error: &Error) -> ErrorCategory {
    match error {
        Error::FileLocked(_) => ErrorCategory::FileLock,
        e if is_file_lock_message(&e.to_string()) => ErrorCategory::FileLock,
        Error::NoActiveSession
        | Error::InvalidInput(_)
        | Error::NotFound { .. }
        | Error::Config(_)
        | Error::Llm(LlmError::MissingApiKey(_)) => ErrorCategory::UserAction,
        Error::Llm(_) | Error::Cloud(_) => ErrorCategory::Transient,
        Error::Storage(_) | Error::Database(_) => ErrorCategory::Persistence,
        _ => ErrorCategory::Unknown,
    }
}

/// Returns true when a message carries one of the known busy-file markers.
pub fn is_file_lock_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("ebusy") || lower.contains("errno -16") || lower.contains("resource busy or locked")
}

/// Structured error payload for the webview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub suggestion: String,
}

pub const FILE_LOCK_HINT: &str = "Close the other tool that has the file open and retry.";

/// Translate an error into the `{type, message, suggestion}` shape.
pub fn user_facing(error: &Error) -> UserFacingError {
    let (kind, suggestion) = match classify(error) {
        ErrorCategory::FileLock => ("file_lock", FILE_LOCK_HINT),
        ErrorCategory::UserAction => ("user_action", "Check the request and try again."),
        ErrorCategory::Transient => ("transient", "The provider did not respond. Try again shortly."),
        ErrorCategory::Persistence => ("persistence", "Changes are kept in memory for this session."),
        ErrorCategory::Unknown => ("unknown", "Reload the window if the problem persists."),
    };
    UserFacingError {
        kind: kind.to_string(),
        message: error.to_string(),
        suggestion: suggestion.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_lock_detection() {
        assert!(is_file_lock_message("EBUSY: resource busy or locked, open 'settings.json'"));
        assert!(is_file_lock_message("Error: errno -16 while writing"));
        assert!(!is_file_lock_message("ENOENT: no such file"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&Error::NoActiveSession), ErrorCategory::UserAction);
        assert_eq!(
            classify(&Error::Storage("EBUSY".to_string())),
            ErrorCategory::FileLock
        );
        assert_eq!(
            classify(&Error::Llm(LlmError::Timeout(30))),
            ErrorCategory::Transient
        );
        assert_eq!(
            classify(&Error::Storage("disk full".to_string())),
            ErrorCategory::Persistence
        );
    }

    #[test]
    fn test_user_facing_unknown() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let payload = user_facing(&err);
        assert_eq!(payload.kind, "unknown");
        assert!(payload.message.contains("boom"));
    }

    #[test]
    fn test_lock_aware_retag() {
        let err = Error::Io(std::io::Error::from_raw_os_error(16)).into_lock_aware();
        assert!(matches!(err, Error::FileLocked(_)));
    }
}
