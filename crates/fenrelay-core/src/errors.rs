use crate::position::NormalizeError;

/// Error taxonomy shared across the relay.
///
/// None of these are fatal: malformed input is dropped, transient and
/// connection errors are retried. Components log them at the boundary and
/// keep running.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RelayError {
    // Dropped
    #[error("malformed input: {0}")]
    MalformedInput(String),

    // Retried
    #[error("temporarily unavailable: {0}")]
    TransientUnavailable(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

impl RelayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientUnavailable(_) | Self::ConnectionLost(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "malformed_input",
            Self::TransientUnavailable(_) => "transient_unavailable",
            Self::ConnectionLost(_) => "connection_lost",
        }
    }
}

impl From<NormalizeError> for RelayError {
    fn from(e: NormalizeError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedInput(e.to_string())
    }
}
