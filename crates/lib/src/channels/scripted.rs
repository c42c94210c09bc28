//! In-memory transport that replays a scripted sequence of poll results.
//!
//! Every send and fetch is recorded so callers can assert on what the engine did.

use crate::channels::inbound::InboundMessage;
use crate::channels::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(2);

/// Scripted transport: each fetch pops the next queued result; once the script is exhausted
/// fetches sleep for the idle delay and return an empty batch.
pub struct ScriptedTransport {
    polls: Mutex<VecDeque<Result<Vec<InboundMessage>, TransportError>>>,
    send_failures: Mutex<VecDeque<Option<TransportError>>>,
    sent: Mutex<Vec<(String, String)>>,
    fetches: Mutex<Vec<(i64, u64)>>,
    idle_delay: Duration,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            polls: Mutex::new(VecDeque::new()),
            send_failures: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }

    /// Delay applied to fetches once the script runs dry (stands in for a long-poll wait).
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Queue a batch for the next fetch.
    pub fn push_batch(&self, batch: Vec<InboundMessage>) -> &Self {
        lock(&self.polls).push_back(Ok(batch));
        self
    }

    /// Queue a fetch failure.
    pub fn push_error(&self, err: TransportError) -> &Self {
        lock(&self.polls).push_back(Err(err));
        self
    }

    /// Make the n-th upcoming send (0-based from now) fail with `err`.
    pub fn fail_send(&self, nth: usize, err: TransportError) -> &Self {
        let mut q = lock(&self.send_failures);
        while q.len() <= nth {
            q.push_back(None);
        }
        q[nth] = Some(err);
        self
    }

    /// Texts sent so far, in order, with their conversation ids.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    /// Just the sent texts.
    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|(_, t)| t.clone()).collect()
    }

    /// `(offset, wait_secs)` of every fetch made so far.
    pub fn fetches(&self) -> Vec<(i64, u64)> {
        lock(&self.fetches).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, conversation_id: &str, text: &str) -> Result<i64, TransportError> {
        if let Some(Some(err)) = lock(&self.send_failures).pop_front() {
            return Err(err);
        }
        let mut sent = lock(&self.sent);
        sent.push((conversation_id.to_string(), text.to_string()));
        Ok(sent.len() as i64)
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        lock(&self.fetches).push((offset, wait_secs));
        let next = lock(&self.polls).pop_front();
        match next {
            Some(result) => result,
            None => {
                if wait_secs > 0 {
                    tokio::time::sleep(self.idle_delay).await;
                }
                Ok(Vec::new())
            }
        }
    }
}
