use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Top-level error type for the `seerr-api` crate.
///
/// Every request either returns the decoded JSON body or one of these.
/// `seerr-core` wraps them without downgrading: a failed call is always fatal
/// for the reconciliation step that issued it.
#[derive(Debug, Error)]
pub enum Error {
    // ── Remote API ──────────────────────────────────────────────────
    /// The remote answered with a status other than the one the caller expected.
    #[error("Unexpected response with status code {status} from '{method} {url}': {message}")]
    Api {
        method: Method,
        url: String,
        status: u16,
        message: String,
    },

    // ── Authentication ──────────────────────────────────────────────
    /// The API key could not be encoded as a header value.
    #[error("Invalid API key header value: {0}")]
    InvalidApiKey(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Build an [`Error::Api`] from a response that did not carry the expected status.
    pub(crate) fn unexpected_status(
        method: Method,
        url: &url::Url,
        status: StatusCode,
        raw_body: &str,
    ) -> Self {
        let message = if raw_body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_owned()
        } else {
            match serde_json::from_str::<Value>(raw_body) {
                Ok(body) => extract_error_message(&body),
                Err(_) => raw_body.to_owned(),
            }
        };
        Self::Api {
            method,
            url: url.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    /// The HTTP status code, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// ── Error message extraction ────────────────────────────────────────

type Extractor = fn(&Value) -> Option<String>;

/// Tried in order against an error body; the first one yielding a string wins.
const EXTRACTORS: &[Extractor] = &[message_key, error_key];

fn message_key(body: &Value) -> Option<String> {
    body.get("message").map(value_text)
}

fn error_key(body: &Value) -> Option<String> {
    body.get("error").map(value_text)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_single(body: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(body))
        .unwrap_or_else(|| format!("(Unsupported error JSON format) {body}"))
}

/// Produce a human-readable message from an error response body.
///
/// Objects are searched for a `message` key, then an `error` key. List
/// bodies yield one line per element. Anything else is reported verbatim.
pub fn extract_error_message(body: &Value) -> String {
    match body {
        Value::Array(items) => items
            .iter()
            .map(extract_single)
            .collect::<Vec<_>>()
            .join("\n"),
        other => extract_single(other),
    }
}
