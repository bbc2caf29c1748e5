use fenrelay_core::RelayError;

/// Transport-level failures. All of them end the current connection.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed by peer")]
    Closed,
}

impl LinkError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Closed => "closed",
        }
    }
}

impl From<LinkError> for RelayError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Connect { .. } => Self::TransientUnavailable(e.to_string()),
            _ => Self::ConnectionLost(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_link_error_is_retryable() {
        let errors = [
            LinkError::Connect {
                url: "ws://localhost:8085".into(),
                reason: "refused".into(),
            },
            LinkError::Send("broken pipe".into()),
            LinkError::Receive("reset".into()),
            LinkError::Closed,
        ];
        for e in errors {
            let kind = e.error_kind();
            let relay: RelayError = e.into();
            assert!(relay.is_retryable(), "{kind} should be retryable");
        }
    }

    #[test]
    fn connect_failure_is_transient() {
        let e = LinkError::Connect {
            url: "ws://x".into(),
            reason: "dns".into(),
        };
        assert_eq!(e.to_string(), "connect to ws://x failed: dns");
        let relay: RelayError = e.into();
        assert_eq!(relay.error_kind(), "transient_unavailable");
    }
}
