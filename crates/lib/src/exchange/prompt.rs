//! Prompt exchange: send one prompt, take the first non-empty reply.

use crate::channels::InboundMessage;
use crate::session::{Exchange, SessionError};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptReply {
    pub raw: String,
    pub normalized: String,
}

pub struct PromptExchange {
    prompt: String,
    reply: Option<PromptReply>,
}

impl PromptExchange {
    pub fn new(prompt: impl AsRef<str>) -> Result<Self, SessionError> {
        let prompt = prompt.as_ref().trim();
        if prompt.is_empty() {
            return Err(SessionError::config("prompt is required"));
        }
        Ok(Self {
            prompt: prompt.to_string(),
            reply: None,
        })
    }
}

impl Exchange for PromptExchange {
    type Output = PromptReply;

    fn rounds(&self) -> usize {
        1
    }

    fn outbound(&self, _round: usize) -> String {
        self.prompt.clone()
    }

    fn record(&mut self, _round: usize, reply: &InboundMessage) {
        let raw = reply.text.trim().to_string();
        self.reply = Some(PromptReply {
            normalized: raw.clone(),
            raw,
        });
    }

    fn finish(self) -> PromptReply {
        self.reply.unwrap_or_default()
    }
}
