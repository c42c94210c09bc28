//! Session engine and its primitives: offset tracking, poll budgeting and reply filtering.

mod engine;
mod error;
pub mod filter;
pub mod offset;
pub mod poll;

pub use engine::{Exchange, Phase, SessionEngine};
pub use error::SessionError;
