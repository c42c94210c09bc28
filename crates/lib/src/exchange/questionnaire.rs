//! Questionnaire exchange: a fixed list of multiple-choice questions asked one at a time,
//! closed with a numbered recap of the answers.

use crate::channels::InboundMessage;
use crate::session::{Exchange, SessionError};
use serde::{Deserialize, Serialize};

const REPLY_HINT: &str = "reply with a number or free text.";
const SUMMARY_HEADER: &str = "Brainstorming summary:";

/// One question with its ordered options. Options are numbered from 1 when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub key: String,
    pub title: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn new(key: &str, title: &str, options: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}

/// Answer to one question, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_key: String,
    pub question_title: String,
    pub raw_reply: String,
    pub normalized_text: String,
}

/// The reference brainstorming set: target users, key constraint, success criterion.
pub fn default_questions() -> Vec<Question> {
    vec![
        Question::new(
            "target_user",
            "Who is the primary target user?",
            &[
                "New users signing up for the first time",
                "Returning users who already have an account",
                "Internal operators and admins",
            ],
        ),
        Question::new(
            "key_constraint",
            "What is the key constraint?",
            &[
                "Ship as fast as possible",
                "Performance and stability first",
                "Keep the cost low",
            ],
        ),
        Question::new(
            "success_criterion",
            "How do we know it worked?",
            &[
                "Conversion rate goes up",
                "Fewer support tickets",
                "A working prototype validated by real users",
            ],
        ),
    ]
}

/// A single-digit reply `k` selects `options[k-1]` when in range; anything else is the trimmed reply.
pub fn normalize_reply(options: &[String], raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(k) = c.to_digit(10) {
            if k >= 1 {
                if let Some(option) = options.get(k as usize - 1) {
                    return option.clone();
                }
            }
        }
    }
    trimmed.to_string()
}

/// `[round/total]`, the title, numbered options, then the reply hint. `round` is 1-based.
pub fn render_question(round: usize, total: usize, question: &Question) -> String {
    let mut lines = vec![format!("[{}/{}]", round, total), question.title.clone()];
    lines.extend(
        question
            .options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}) {}", i + 1, o)),
    );
    lines.push(REPLY_HINT.to_string());
    lines.join("\n")
}

pub fn render_summary(answers: &[Answer]) -> String {
    let mut out = SUMMARY_HEADER.to_string();
    for (i, a) in answers.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}: {}",
            i + 1,
            a.question_title,
            a.normalized_text
        ));
    }
    out
}

pub struct QuestionnaireExchange {
    questions: Vec<Question>,
    answers: Vec<Answer>,
}

impl QuestionnaireExchange {
    pub fn new(questions: Vec<Question>) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::config("question set is empty"));
        }
        for (i, q) in questions.iter().enumerate() {
            if q.key.trim().is_empty() || q.title.trim().is_empty() {
                return Err(SessionError::config(format!(
                    "question {} needs a key and a title",
                    i + 1
                )));
            }
            if q.options.is_empty() {
                return Err(SessionError::config(format!(
                    "question {} ({}) has no options",
                    i + 1,
                    q.key
                )));
            }
        }
        Ok(Self {
            answers: Vec::with_capacity(questions.len()),
            questions,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

impl Exchange for QuestionnaireExchange {
    type Output = Vec<Answer>;

    fn rounds(&self) -> usize {
        self.questions.len()
    }

    fn outbound(&self, round: usize) -> String {
        render_question(round + 1, self.questions.len(), &self.questions[round])
    }

    fn record(&mut self, round: usize, reply: &InboundMessage) {
        let q = &self.questions[round];
        let raw = reply.text.trim().to_string();
        log::debug!("questionnaire: answer for {} received", q.key);
        self.answers.push(Answer {
            question_key: q.key.clone(),
            question_title: q.title.clone(),
            normalized_text: normalize_reply(&q.options, &raw),
            raw_reply: raw,
        });
    }

    fn closing(&self) -> Option<String> {
        Some(render_summary(&self.answers))
    }

    fn finish(self) -> Vec<Answer> {
        self.answers
    }
}
