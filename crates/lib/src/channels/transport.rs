//! Transport port: the two request/response primitives the session engine consumes.

use crate::channels::inbound::InboundMessage;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transport api error: {0}")]
    Api(String),
    #[error("transport response could not be decoded: {0}")]
    Decode(String),
}

/// Chat transport capable of sending text and long-polling for inbound messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to the conversation. Returns the transport's message id.
    async fn send(&self, conversation_id: &str, text: &str) -> Result<i64, TransportError>;

    /// Fetch messages with sequence id >= `offset`, blocking up to `wait_secs`.
    /// `wait_secs == 0` returns immediately with whatever is pending.
    async fn fetch_updates(
        &self,
        offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<InboundMessage>, TransportError>;
}
