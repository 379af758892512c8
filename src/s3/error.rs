//! Error taxonomy for S3 operations

use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Parsed S3 `<Error>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: Option<String>,
    pub message: Option<String>,
    pub resource: Option<String>,
    pub request_id: Option<String>,
    pub host_id: Option<String>,
}

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    /// Invalid client configuration, detected before any request is sent
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response. `error` is `None` when the server sent no body (HEAD).
    #[error("error occurred on '{action}': {status}{}", error_code(.error))]
    S3Response {
        action: &'static str,
        status: StatusCode,
        status_message: String,
        error: Option<ErrorResponse>,
    },

    /// The response body could not be parsed into the expected form
    #[error("could not unmarshal '{action}' response: {message}")]
    Unmarshal {
        action: &'static str,
        message: String,
        raw: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The upload source failed mid-stream
    #[error("source stream error: {0}")]
    Stream(#[source] std::io::Error),
}

fn error_code(error: &Option<ErrorResponse>) -> String {
    match error.as_ref().and_then(|e| e.code.as_deref()) {
        Some(code) => format!(" ({})", code),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, S3Error>;

impl S3Error {
    /// HTTP status of a protocol error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            S3Error::S3Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed error document of a protocol error
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            S3Error::S3Response { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<hyper::http::Error> for S3Error {
    fn from(err: hyper::http::Error) -> Self {
        S3Error::Transport(format!("request build error: {}", err))
    }
}

impl From<hyper::Error> for S3Error {
    fn from(err: hyper::Error) -> Self {
        S3Error::Transport(err.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for S3Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        S3Error::Transport(format!("client error: {}", err))
    }
}
