//! Parley core library: drive short interactive exchanges over a chat transport.
//!
//! A session sends one or more prompts to a fixed conversation and long-polls until a qualifying
//! reply arrives or the deadline expires. Prompt, questionnaire and challenge exchanges share the
//! same engine.

pub mod channels;
pub mod config;
pub mod exchange;
pub mod init;
pub mod session;
