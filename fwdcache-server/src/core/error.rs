use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::types::ProxyMode;

/// Errors surfaced to proxy clients.
///
/// The `Display` text of each variant is the exact plain-text body written to
/// the client, so it must stay short and stable.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Embedded target path was not valid percent-encoding
    #[error("Invalid URL encoding")]
    InvalidEncoding,

    /// Decoded target does not start with `http://` or `https://`
    #[error("Invalid target URL")]
    InvalidScheme,

    /// Upstream could not be reached (connect, transport or timeout failure)
    #[error("{}", fetch_failure_message(.mode))]
    FetchFailure { mode: ProxyMode, reason: String },

    /// Upstream body could not be fully read
    #[error("Failed to read response")]
    ReadFailure(String),
}

fn fetch_failure_message(mode: &ProxyMode) -> &'static str {
    match mode {
        ProxyMode::Embedded => "Failed to reach target server",
        ProxyMode::SelfUrl => "Failed to fetch from target",
    }
}

impl ProxyError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidEncoding | Self::InvalidScheme => StatusCode::BAD_REQUEST,
            Self::FetchFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::ReadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal detail for logs; never sent to the client
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::FetchFailure { reason, .. } | Self::ReadFailure(reason) => Some(reason),
            Self::InvalidEncoding | Self::InvalidScheme => None,
        }
    }
}

/// Errors are written as a one-line `text/plain` body.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = format!("{}\n", self);

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            body,
        )
            .into_response()
    }
}

/// Result type alias for request handling
pub type Result<T> = std::result::Result<T, ProxyError>;
