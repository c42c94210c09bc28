//! Exchange shapes driven by the session engine: a single prompt, a questionnaire, and a challenge/response.

mod challenge;
mod prompt;
mod questionnaire;

pub use challenge::{
    challenge_message, code_from_bytes, generate_code, is_matching_reply, ChallengeExchange,
    ChallengeReply,
};
pub use prompt::{PromptExchange, PromptReply};
pub use questionnaire::{
    default_questions, normalize_reply, render_question, render_summary, Answer, Question,
    QuestionnaireExchange,
};
