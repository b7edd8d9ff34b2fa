//! Classified failures of remote inference calls

use thiserror::Error;

/// Why a single request to the inference endpoint failed
#[derive(Error, Debug)]
pub enum RequestError {
    /// No response within the request deadline
    #[error("request timed out")]
    Timeout,

    /// TCP connect failed (refused, unreachable, DNS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Non-success HTTP status
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body did not decode as a chat completion, or had no content
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else reported by the transport
    #[error("request failed: {0}")]
    Other(String),
}

/// Failure category, used for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestErrorKind {
    Timeout,
    Connect,
    Status,
    MalformedResponse,
    Other,
}

impl RequestError {
    pub fn kind(&self) -> RequestErrorKind {
        match self {
            RequestError::Timeout => RequestErrorKind::Timeout,
            RequestError::Connect(_) => RequestErrorKind::Connect,
            RequestError::Status { .. } => RequestErrorKind::Status,
            RequestError::MalformedResponse(_) => RequestErrorKind::MalformedResponse,
            RequestError::Other(_) => RequestErrorKind::Other,
        }
    }
}

impl std::fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestErrorKind::Timeout => write!(f, "timeout"),
            RequestErrorKind::Connect => write!(f, "connect"),
            RequestErrorKind::Status => write!(f, "http-status"),
            RequestErrorKind::MalformedResponse => write!(f, "malformed-response"),
            RequestErrorKind::Other => write!(f, "other"),
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        // Connect timeouts report both flags; count them as timeouts
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_connect() {
            RequestError::Connect(err.to_string())
        } else if err.is_status() {
            RequestError::Status {
                status: err.status().map(|s| s.as_u16()).unwrap_or_default(),
                body: String::new(),
            }
        } else if err.is_decode() {
            RequestError::MalformedResponse(err.to_string())
        } else {
            RequestError::Other(err.to_string())
        }
    }
}
