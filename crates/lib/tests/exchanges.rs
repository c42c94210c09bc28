//! End-to-end exchanges through the session engine over the scripted in-memory transport.

use async_trait::async_trait;
use parley::channels::{InboundMessage, ScriptedTransport, Transport, TransportError};
use parley::exchange::{
    default_questions, render_question, render_summary, ChallengeExchange, PromptExchange, Question,
    QuestionnaireExchange,
};
use parley::session::{SessionEngine, SessionError};
use std::time::{Duration, Instant};

const CHAT: &str = "1001";

fn reply(id: i64, text: &str) -> InboundMessage {
    InboundMessage::new(id, CHAT, text)
}

#[tokio::test]
async fn questionnaire_collects_normalized_answers_and_sends_summary() {
    let questions = default_questions();
    let t = ScriptedTransport::new();
    t.push_batch(vec![])
        .push_batch(vec![reply(2, "1")])
        .push_batch(vec![reply(3, "性能和稳定性优先")])
        .push_batch(vec![reply(4, "3")]);

    let answers = SessionEngine::new(&t, CHAT)
        .run(
            QuestionnaireExchange::new(questions.clone()).unwrap(),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0].normalized_text, questions[0].options[0]);
    assert_eq!(answers[0].raw_reply, "1");
    assert_eq!(answers[1].normalized_text, "性能和稳定性优先");
    assert_eq!(answers[2].normalized_text, questions[2].options[2]);
    assert_eq!(answers[2].question_key, questions[2].key);

    let sent = t.sent();
    assert_eq!(sent.len(), 4, "one message per round plus the summary");
    assert!(sent.iter().all(|(chat, _)| chat == CHAT));
    assert_eq!(sent[0].1, render_question(1, 3, &questions[0]));
    assert!(sent[1].1.starts_with("[2/3]\n"));
    assert!(sent[3].1.contains("2. "));
    assert!(sent[3].1.contains("性能和稳定性优先"));
}

#[tokio::test]
async fn single_question_questionnaire_runs_one_round_then_summary() {
    let questions = vec![Question::new("launch", "Ship this week?", &["yes", "no"])];
    let t = ScriptedTransport::new();
    t.push_batch(vec![]).push_batch(vec![reply(7, " 2 ")]);

    let answers = SessionEngine::new(&t, CHAT)
        .run(
            QuestionnaireExchange::new(questions).unwrap(),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].normalized_text, "no");
    let sent = t.sent_texts();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("[1/1]\nShip this week?\n1) yes\n2) no"));
    assert_eq!(sent[1], render_summary(&answers));
    assert!(sent[1].contains("1. Ship this week?: no"));
}

#[tokio::test]
async fn questionnaire_timing_out_mid_sequence_reports_timeout_only() {
    let t = ScriptedTransport::new();
    t.push_batch(vec![]).push_batch(vec![reply(1, "2")]);

    let err = SessionEngine::new(&t, CHAT)
        .run(
            QuestionnaireExchange::new(default_questions()).unwrap(),
            Duration::from_millis(40),
        )
        .await
        .unwrap_err();

    assert!(err.is_deadline_exceeded(), "got {:?}", err);
    assert_eq!(t.sent_texts().len(), 2, "no summary after a timeout");
}

#[tokio::test]
async fn prompt_ignores_backlog_and_other_chats() {
    let t = ScriptedTransport::new();
    t.push_batch(vec![reply(10, "stale answer")])
        .push_batch(vec![InboundMessage::new(11, "999", "wrong chat"), reply(12, "  ")])
        .push_batch(vec![reply(13, "  go with option B  ")]);

    let out = SessionEngine::new(&t, CHAT)
        .run(PromptExchange::new("Which option?").unwrap(), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(out.normalized, "go with option B");
    assert_eq!(t.sent_texts(), vec!["Which option?"]);
    let offsets: Vec<i64> = t.fetches().iter().map(|f| f.0).collect();
    assert_eq!(offsets, vec![0, 11, 13]);
}

#[tokio::test]
async fn challenge_waits_through_wrong_replies() {
    let t = ScriptedTransport::new();
    t.push_batch(vec![])
        .push_batch(vec![reply(1, "123457")])
        .push_batch(vec![reply(2, "hello"), reply(3, "“[654321]”")]);

    let out = SessionEngine::new(&t, CHAT)
        .run(ChallengeExchange::new("654321").unwrap(), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(out.code, "654321");
    assert_eq!(out.reply, "“[654321]”");
    assert_eq!(t.sent_texts(), vec!["This is a test, please reply \"[654321]\""]);
}

#[tokio::test]
async fn challenge_times_out_without_hanging() {
    let t = ScriptedTransport::new();
    let started = Instant::now();
    let err = SessionEngine::new(&t, CHAT)
        .run(ChallengeExchange::new("000042").unwrap(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::DeadlineExceeded), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(2));
}

/// Long-polls for up to the requested wait, then fails as a dropped connection would.
struct StragglingTransport;

#[async_trait]
impl Transport for StragglingTransport {
    async fn send(&self, _conversation_id: &str, _text: &str) -> Result<i64, TransportError> {
        Ok(1)
    }

    async fn fetch_updates(
        &self,
        _offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        if wait_secs == 0 {
            return Ok(Vec::new());
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        Err(TransportError::Api("connection reset".into()))
    }
}

#[tokio::test]
async fn deadline_wins_over_straggling_transport_failure() {
    let err = SessionEngine::new(&StragglingTransport, CHAT)
        .run(PromptExchange::new("ping").unwrap(), Duration::from_millis(25))
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded(), "got {:?}", err);
}
