use thiserror::Error;

/// Failures that abort face construction. A face without a ticking clock is
/// not a degraded mode, so these are never swallowed.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("tick scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
    #[error("invalid tick interval {0}ms")]
    InvalidTickInterval(u64),
}

/// Transient companion-link failures. Handled inside the sync client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("companion link not connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("message to node {node} on {path} not delivered: {reason}")]
    Delivery {
        node: String,
        path: String,
        reason: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
}

/// A weather record that cannot become a snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("weather record missing field `{0}`")]
    MissingField(&'static str),
    #[error("weather record field `{key}` is invalid: {reason}")]
    InvalidField { key: &'static str, reason: String },
}
