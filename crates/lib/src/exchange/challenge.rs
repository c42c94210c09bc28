//! Challenge exchange: send a random six-digit code and wait for it to be echoed back exactly.

use crate::channels::InboundMessage;
use crate::session::{Exchange, SessionError};
use serde::Serialize;

const CODE_MODULUS: u32 = 1_000_000;

/// Quoting and bracket characters a reply may wrap the code in.
const DECORATIONS: &[char] = &['"', '\'', '“', '”', '‘', '’', '[', ']'];

/// Six zero-padded digits from four big-endian bytes reduced modulo 1,000,000.
pub fn code_from_bytes(bytes: [u8; 4]) -> String {
    format!("{:06}", u32::from_be_bytes(bytes) % CODE_MODULUS)
}

/// Fresh code from the OS random source.
pub fn generate_code() -> Result<String, SessionError> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes).map_err(|e| SessionError::Random(e.to_string()))?;
    Ok(code_from_bytes(bytes))
}

pub fn challenge_message(code: &str) -> String {
    format!("This is a test, please reply \"[{}]\"", code)
}

/// Exact, case-sensitive comparison after trimming whitespace and then decoration characters.
pub fn is_matching_reply(reply: &str, code: &str) -> bool {
    reply.trim().trim_matches(DECORATIONS) == code
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeReply {
    pub code: String,
    pub reply: String,
}

pub struct ChallengeExchange {
    code: String,
    reply: Option<String>,
}

impl ChallengeExchange {
    pub fn new(code: impl Into<String>) -> Result<Self, SessionError> {
        let code = code.into();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::config(format!(
                "challenge code must be six digits, got {:?}",
                code
            )));
        }
        Ok(Self { code, reply: None })
    }

    pub fn generate() -> Result<Self, SessionError> {
        Self::new(generate_code()?)
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Exchange for ChallengeExchange {
    type Output = ChallengeReply;

    fn rounds(&self) -> usize {
        1
    }

    fn outbound(&self, _round: usize) -> String {
        challenge_message(&self.code)
    }

    fn accepts(&self, _round: usize, text: &str) -> bool {
        let ok = is_matching_reply(text, &self.code);
        if !ok {
            log::warn!("challenge: reply {:?} does not match, still waiting", text);
        }
        ok
    }

    fn record(&mut self, _round: usize, reply: &InboundMessage) {
        self.reply = Some(reply.text.trim().to_string());
    }

    fn finish(self) -> ChallengeReply {
        ChallengeReply {
            reply: self.reply.unwrap_or_default(),
            code: self.code,
        }
    }
}
