use thiserror::Error;

#[derive(Debug, Error)]
pub enum GhostError {
    /// The call was superseded by a newer keystroke. Never a user-visible failure.
    #[error("cancelled")]
    Cancelled,

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GhostError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for errors that count against `failed_requests`: the request was
    /// sent and the endpoint (or the network) rejected it.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Request(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Produce a sanitized message safe for returning to the host.
    /// Does not leak endpoint URLs, keys, or upstream error bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Cancelled => "superseded by a newer request".to_string(),
            Self::Upstream { status, .. } => format!("completion endpoint returned {status}"),
            Self::Request(e) if e.is_timeout() => "completion request timed out".to_string(),
            Self::Request(_) => "request to completion endpoint failed".to_string(),
            Self::SchemaParse(_) => "failed to parse completion response".to_string(),
            Self::Config(msg) => format!("invalid configuration: {msg}"),
        }
    }
}
