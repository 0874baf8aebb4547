use thiserror::Error;

/// spec.md §7's `UpstreamUnavailable` kind, split by cause.
#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("upstream user service timed out")]
    Timeout,

    #[error("upstream user service is unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream user service returned unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("failed to decode upstream response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl UserServiceError {
    /// Whether this failure should trigger an immediate probe re-check
    /// (spec.md §4.4: "any handler call that raises a transport error on
    /// the upstream triggers an immediate `CheckNow`").
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}
