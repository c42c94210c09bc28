//! Session error kinds.

use crate::channels::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Rejected before any network call (bad conversation id, non-positive timeout, empty prompt or question set).
    #[error("configuration error: {0}")]
    Config(String),
    /// Send or fetch failed; `op` names the step that failed.
    #[error("{op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("no qualifying reply before the session deadline")]
    DeadlineExceeded,
    #[error("session cancelled")]
    Cancelled,
    #[error("random source failed: {0}")]
    Random(String),
}

impl SessionError {
    pub fn config(msg: impl Into<String>) -> Self {
        SessionError::Config(msg.into())
    }

    pub fn transport(op: &'static str, source: TransportError) -> Self {
        SessionError::Transport { op, source }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, SessionError::DeadlineExceeded)
    }
}
