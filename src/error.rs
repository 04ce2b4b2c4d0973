//! Error types for the clipping pipeline.
//!
//! Every failure a pipeline step can produce falls into one of four
//! categories, surfaced to the user verbatim:
//!
//! - **Configuration** — missing credentials or settings; the action is never
//!   attempted and nothing is retried.
//! - **Validation** — bad input (unsupported file types, missing fields);
//!   surfaced before any network call.
//! - **Transport** — network failures and non-2xx backend responses, carrying
//!   the backend's own message when one was available.
//! - **Parse** — the AI response could not be turned into a JSON object.
//!   Two distinct cases: no braces at all ([`ClipError::NoJsonObject`],
//!   which usually means the model refused) and a malformed object between
//!   the braces ([`ClipError::InvalidResponse`]).

use thiserror::Error;

/// Result type alias using the clipper's error type.
pub type Result<T> = std::result::Result<T, ClipError>;

/// Error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum ClipError {
    /// Missing or unusable configuration (API key, connection, model).
    #[error("{0}")]
    Configuration(String),

    /// Input rejected before any processing was attempted.
    #[error("{0}")]
    Validation(String),

    /// Network failure or non-success response from a remote backend.
    #[error("{message}")]
    Transport {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Backend-provided message, or a generic status-coded one.
        message: String,
    },

    /// The AI response contained no `{ … }` window to parse.
    #[error("No valid JSON object found in the AI response.")]
    NoJsonObject,

    /// The extracted `{ … }` window was not valid JSON.
    #[error("The AI returned an invalid response. Please check the content and try again.")]
    InvalidResponse(#[source] serde_json::Error),
}

impl ClipError {
    /// Transport error from an HTTP status plus an optional backend message.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        ClipError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClipError {
    fn from(e: reqwest::Error) -> Self {
        ClipError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
