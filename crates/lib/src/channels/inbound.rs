//! Inbound message from a channel: one entry of a fetched update batch.

/// A message observed on the transport. `sequence_id` orders the batch; `conversation_id` is the
/// sender chat rendered as text (the only correlation key the transport offers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sequence_id: i64,
    pub conversation_id: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        sequence_id: i64,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            conversation_id: conversation_id.into(),
            text: text.into(),
        }
    }
}
