//! Session engine: drain backlog, send a round's text, long-poll until a qualifying reply or the deadline.
//!
//! The loop is the same for every exchange shape; an [`Exchange`] supplies the round count, the
//! outbound text per round, the acceptance predicate and the closing message.

use crate::channels::{InboundMessage, Transport};
use crate::session::error::SessionError;
use crate::session::{filter, offset, poll};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longer timeouts are clamped so the deadline stays representable.
const MAX_SESSION_TIMEOUT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Policy for one exchange shape driven by [`SessionEngine::run`].
pub trait Exchange {
    type Output;

    /// Number of rounds; must be at least 1.
    fn rounds(&self) -> usize;

    /// Text announced at the start of `round` (0-based). Called after earlier rounds are recorded.
    fn outbound(&self, round: usize) -> String;

    /// Whether a non-empty trimmed reply from the conversation completes `round`.
    /// Rejected replies are skipped and the engine keeps waiting.
    fn accepts(&self, _round: usize, _text: &str) -> bool {
        true
    }

    /// Store the reply that completed `round`.
    fn record(&mut self, round: usize, reply: &InboundMessage);

    /// Optional message sent after the last round.
    fn closing(&self) -> Option<String> {
        None
    }

    fn finish(self) -> Self::Output;
}

/// Engine phases, logged at debug level as the session moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Draining,
    Announcing,
    Waiting(usize),
    Advancing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Draining => write!(f, "draining"),
            Phase::Announcing => write!(f, "announcing"),
            Phase::Waiting(round) => write!(f, "waiting(round {})", round + 1),
            Phase::Advancing => write!(f, "advancing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Drives exchanges against one conversation over a borrowed transport.
///
/// The offset and deadline live only for the duration of [`run`](Self::run). Running two sessions
/// concurrently against the same conversation and transport is the caller's responsibility to avoid:
/// both would consume the same inbound stream with independent offsets.
pub struct SessionEngine<'a, T: Transport + ?Sized> {
    transport: &'a T,
    conversation_id: String,
    cancel: CancellationToken,
}

impl<'a, T: Transport + ?Sized> SessionEngine<'a, T> {
    pub fn new(transport: &'a T, conversation_id: impl Into<String>) -> Self {
        Self {
            transport,
            conversation_id: conversation_id.into().trim().to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the session when `token` is cancelled. An in-flight send or fetch is dropped at once.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run `exchange` to completion. The deadline is `timeout` from now and covers every round.
    pub async fn run<E: Exchange>(
        &self,
        mut exchange: E,
        timeout: Duration,
    ) -> Result<E::Output, SessionError> {
        if self.conversation_id.is_empty() {
            return Err(SessionError::config("conversation id is required"));
        }
        if timeout.is_zero() {
            return Err(SessionError::config(
                "session timeout must be greater than 0",
            ));
        }
        let total = exchange.rounds();
        if total == 0 {
            return Err(SessionError::config("exchange has no rounds"));
        }

        let deadline = Instant::now() + timeout.min(MAX_SESSION_TIMEOUT);
        log::info!(
            "session: conversation {} rounds={} timeout={}s",
            self.conversation_id,
            total,
            timeout.as_secs_f64()
        );

        self.enter(Phase::Draining);
        let mut cursor = self.drain().await?;

        for round in 0..total {
            let (phase, op) = if round == 0 {
                (Phase::Announcing, "send message")
            } else {
                (Phase::Advancing, "send next round")
            };
            self.enter(phase);
            self.send(&exchange.outbound(round), op).await?;

            self.enter(Phase::Waiting(round));
            let reply = self
                .wait_for_reply(&exchange, round, &mut cursor, deadline)
                .await?;
            exchange.record(round, &reply);
        }

        self.enter(Phase::Done);
        if let Some(closing) = exchange.closing() {
            self.send(&closing, "send closing message").await?;
        }
        log::info!("session: conversation {} completed", self.conversation_id);
        Ok(exchange.finish())
    }

    fn enter(&self, phase: Phase) {
        log::debug!("session {}: {}", self.conversation_id, phase);
    }

    /// Zero-wait read of everything pending so backlog from before the session is never taken as a reply.
    async fn drain(&self) -> Result<i64, SessionError> {
        let pending = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            res = self.transport.fetch_updates(0, 0) => {
                res.map_err(|e| SessionError::transport("drain pending updates", e))?
            }
        };
        let start = offset::initial(&pending);
        log::debug!(
            "session {}: drained {} pending update(s), offset={}",
            self.conversation_id,
            pending.len(),
            start
        );
        Ok(start)
    }

    async fn send(&self, text: &str, op: &'static str) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            res = self.transport.send(&self.conversation_id, text) => {
                let id = res.map_err(|e| SessionError::transport(op, e))?;
                log::debug!("session {}: sent message {}", self.conversation_id, id);
                Ok(())
            }
        }
    }

    async fn wait_for_reply<E: Exchange>(
        &self,
        exchange: &E,
        round: usize,
        cursor: &mut i64,
        deadline: Instant,
    ) -> Result<InboundMessage, SessionError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SessionError::DeadlineExceeded);
            }
            let wait = poll::next_wait(deadline - now);

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(SessionError::DeadlineExceeded)
                }
                res = self.transport.fetch_updates(*cursor, wait) => res,
            };
            let batch = match fetched {
                Ok(batch) => batch,
                Err(e) if Instant::now() >= deadline => {
                    log::debug!(
                        "session {}: poll failed after deadline: {}",
                        self.conversation_id,
                        e
                    );
                    return Err(SessionError::DeadlineExceeded);
                }
                Err(e) => return Err(SessionError::transport("poll updates", e)),
            };

            let floor = *cursor;
            *cursor = offset::advance(floor, &batch);
            let fresh = batch.iter().filter(|m| m.sequence_id >= floor);
            if let Some(reply) = filter::select_where(fresh, &self.conversation_id, |text| {
                exchange.accepts(round, text)
            }) {
                return Ok(reply.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ScriptedTransport, TransportError};

    /// Echo exchange: N rounds, records trimmed replies, rejects the literal "skip".
    struct Echo {
        rounds: usize,
        replies: Vec<String>,
    }

    impl Echo {
        fn new(rounds: usize) -> Self {
            Self {
                rounds,
                replies: Vec::new(),
            }
        }
    }

    impl Exchange for Echo {
        type Output = Vec<String>;

        fn rounds(&self) -> usize {
            self.rounds
        }

        fn outbound(&self, round: usize) -> String {
            format!("q{} after {:?}", round + 1, self.replies)
        }

        fn accepts(&self, _round: usize, text: &str) -> bool {
            text != "skip"
        }

        fn record(&mut self, _round: usize, reply: &InboundMessage) {
            self.replies.push(reply.text.trim().to_string());
        }

        fn closing(&self) -> Option<String> {
            Some("bye".to_string())
        }

        fn finish(self) -> Vec<String> {
            self.replies
        }
    }

    fn msg(id: i64, chat: &str, text: &str) -> InboundMessage {
        InboundMessage::new(id, chat, text)
    }

    #[tokio::test]
    async fn backlog_is_drained_and_not_taken_as_reply() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![msg(40, "1", "old answer"), msg(41, "1", "older")])
            .push_batch(vec![msg(42, "1", "fresh")]);

        let engine = SessionEngine::new(&t, "1");
        let out = engine.run(Echo::new(1), Duration::from_secs(2)).await.unwrap();

        assert_eq!(out, vec!["fresh"]);
        let fetches = t.fetches();
        assert_eq!(fetches[0], (0, 0));
        assert_eq!(fetches[1].0, 42);
    }

    #[tokio::test]
    async fn later_rounds_see_recorded_state_and_closing_is_sent() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![])
            .push_batch(vec![msg(1, "1", "a")])
            .push_batch(vec![msg(2, "1", "b")]);

        let out = SessionEngine::new(&t, "1")
            .run(Echo::new(2), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(
            t.sent_texts(),
            vec!["q1 after []", "q2 after [\"a\"]", "bye"]
        );
    }

    #[tokio::test]
    async fn rejected_reply_keeps_waiting_and_later_message_in_batch_counts() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![])
            .push_batch(vec![msg(5, "1", "skip")])
            .push_batch(vec![msg(6, "2", "other chat"), msg(7, "1", "skip"), msg(8, "1", "ok")]);

        let out = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(out, vec!["ok"]);
        let offsets: Vec<i64> = t.fetches().iter().map(|f| f.0).collect();
        assert_eq!(offsets, vec![0, 0, 6]);
    }

    #[tokio::test]
    async fn redelivered_message_is_not_consumed_twice() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![])
            .push_batch(vec![msg(3, "1", "first")])
            .push_batch(vec![msg(3, "1", "first")])
            .push_batch(vec![msg(4, "1", "second")]);

        let out = SessionEngine::new(&t, "1")
            .run(Echo::new(2), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(out, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn times_out_when_no_reply_arrives() {
        let t = ScriptedTransport::new();
        let started = std::time::Instant::now();
        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded(), "got {:?}", err);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(t.fetches().iter().skip(1).all(|&(_, w)| w == 1));
    }

    #[tokio::test]
    async fn huge_timeout_is_clamped_not_overflowed() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![]).push_batch(vec![msg(1, "1", "ok")]);
        let out = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(out, vec!["ok"]);
        assert_eq!(t.fetches()[1].1, poll::LONG_POLL_CAP_SECS);
    }

    #[tokio::test]
    async fn fetch_failure_before_deadline_is_fatal() {
        let t = ScriptedTransport::new();
        t.push_batch(vec![])
            .push_error(TransportError::Api("getUpdates failed: 502".into()));

        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            SessionError::Transport { op, .. } => assert_eq!(op, "poll updates"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn drain_and_send_failures_name_the_step() {
        let t = ScriptedTransport::new();
        t.push_error(TransportError::Api("nope".into()));
        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("drain pending updates"));

        let t = ScriptedTransport::new();
        t.fail_send(0, TransportError::Api("nope".into()));
        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("send message"));
        assert_eq!(t.fetches().len(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_configuration_before_any_call() {
        let t = ScriptedTransport::new();
        let err = SessionEngine::new(&t, "  ")
            .run(Echo::new(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));

        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(1), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));

        let err = SessionEngine::new(&t, "1")
            .run(Echo::new(0), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));

        assert!(t.fetches().is_empty());
        assert!(t.sent().is_empty());
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_deadline() {
        let t = ScriptedTransport::new().with_idle_delay(Duration::from_millis(20));
        let token = CancellationToken::new();
        let engine = SessionEngine::new(&t, "1").with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            token.cancel();
        });
        let err = engine
            .run(Echo::new(1), Duration::from_secs(30))
            .await
            .unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, SessionError::Cancelled), "got {:?}", err);
    }
}
