//! Error types for the orderdesk client.
//!
//! Everything user-facing funnels into [`Error`]: credential rejections,
//! backend validation maps, anti-forgery token failures, session expiry,
//! geolocation failures, and plain transport faults. The session layer
//! produces these from raw responses; contexts and pages refine them
//! (for example a 401 on login becomes `InvalidCredentials`).

use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;

use crate::location::LocationError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Field-keyed validation messages.
///
/// The backend answers 400s with either `{"detail": "..."}` or a map of
/// `{"field": ["msg", ...]}`; client-side form checks produce the same shape
/// so callers render both identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field convenience constructor.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Turns a JSON object of `field -> message | [messages]` into field
    /// errors. Returns `None` when the object does not look like a DRF
    /// validation map (for example a bare `{"detail": ...}` body).
    fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.is_empty() || object.contains_key("detail") {
            return None;
        }
        let mut errors = Self::new();
        for (field, messages) in object {
            match messages {
                Value::String(message) => errors.push(field, message),
                Value::Array(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(message) => errors.push(field, message),
                            None => errors.push(field, item.to_string()),
                        }
                    }
                }
                other => errors.push(field, other.to_string()),
            }
        }
        Some(errors)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Login rejected: wrong password, or an account that is still pending
    /// approval (or blocked). Carries the server's human-readable detail.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Form or payload rejected, locally or by the backend.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The anti-forgery cookie never materialized after an issuing round trip.
    #[error("anti-forgery token unavailable: {0}")]
    TokenUnavailable(String),

    /// 401: the session is dead. Surfaced to the shell as a redirect to
    /// login, not as ordinary error text.
    #[error("not authenticated: {0}")]
    Unauthorized(String),

    /// 403 that survived (or was exempt from) session recovery.
    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Geolocation capture failed; staff checkout stays blocked until a
    /// retry succeeds.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Any other non-success response.
    #[error("api error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// A request body that cannot be rendered as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// Coarse grouping used in logs.
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidCredentials(_) => "credentials",
            Error::Validation(_) => "validation",
            Error::TokenUnavailable(_) => "token",
            Error::Unauthorized(_) => "session",
            Error::Forbidden(_) => "permission",
            Error::NotFound(_) => "not_found",
            Error::Location(_) => "location",
            Error::Api { .. } => "api",
            Error::Serialization(_) => "serialization",
            Error::Transport(_) => "transport",
        }
    }

    /// True when the error means the session itself is gone and the shell
    /// must return to the login screen.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(FieldErrors::single(field, message))
    }
}

/// Extracts the `detail` string the backend puts in error bodies, falling
/// back to the raw body and finally the status reason.
pub(crate) fn detail_from_body(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return detail.to_string();
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return error.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

/// Maps a non-success response to the matching [`Error`] variant.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> Error {
    let detail = detail_from_body(status, body);
    match status {
        StatusCode::BAD_REQUEST => {
            if let Ok(value) = serde_json::from_str::<Value>(body) {
                if let Some(fields) = FieldErrors::from_json(&value) {
                    return Error::Validation(fields);
                }
            }
            Error::Api {
                status: status.as_u16(),
                detail,
            }
        }
        StatusCode::UNAUTHORIZED => Error::Unauthorized(detail),
        StatusCode::FORBIDDEN => Error::Forbidden(detail),
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        _ => Error::Api {
            status: status.as_u16(),
            detail,
        },
    }
}
