//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.parley/config.json`) and environment.
//! Environment variables override the file so secrets can stay out of it.

use crate::exchange::{default_questions, Question};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Channel settings (e.g. Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Session defaults (reply timeout, questionnaire questions).
    #[serde(default)]
    pub session: SessionConfig,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Chat the session talks to. Overridden by TELEGRAM_CHAT_ID env when set.
    pub chat_id: Option<String>,
    /// Bot API base URL (default https://api.telegram.org). Overridden by TELEGRAM_API_BASE.
    pub api_base: Option<String>,
    /// HTTP proxy for all Bot API calls. Overridden by TELEGRAM_PROXY_URL.
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Overall time to wait for replies, in seconds (default 300). Overridden by TELEGRAM_REPLY_TIMEOUT.
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    /// Questions for `brainstorm`. When absent the built-in brainstorming set is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
}

fn default_reply_timeout_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout_secs: default_reply_timeout_secs(),
            questions: None,
        }
    }
}

/// Resolved Telegram connection settings (config merged with env, required fields checked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: Option<String>,
    pub proxy_url: Option<String>,
}

impl TelegramSettings {
    /// Resolve from config and process environment.
    pub fn resolve(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |k| std::env::var(k).ok())
    }

    fn resolve_with(config: &Config, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let t = &config.channels.telegram;
        let bot_token = pick(&env, "TELEGRAM_BOT_TOKEN", t.bot_token.as_ref()).context(
            "telegram bot token not configured: set channels.telegram.botToken (run `parley init`) or TELEGRAM_BOT_TOKEN",
        )?;
        let chat_id = pick(&env, "TELEGRAM_CHAT_ID", t.chat_id.as_ref()).context(
            "telegram chat id not configured: set channels.telegram.chatId (run `parley init`) or TELEGRAM_CHAT_ID",
        )?;
        Ok(Self {
            bot_token,
            chat_id,
            api_base: pick(&env, "TELEGRAM_API_BASE", t.api_base.as_ref()),
            proxy_url: pick(&env, "TELEGRAM_PROXY_URL", t.proxy_url.as_ref()),
        })
    }
}

/// Non-empty trimmed env value, else non-empty trimmed config value.
fn pick(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    configured: Option<&String>,
) -> Option<String> {
    env(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the overall reply timeout: env TELEGRAM_REPLY_TIMEOUT (seconds) overrides config.
pub fn resolve_reply_timeout(config: &Config) -> Result<Duration> {
    reply_timeout_with(config, |k| std::env::var(k).ok())
}

fn reply_timeout_with(config: &Config, env: impl Fn(&str) -> Option<String>) -> Result<Duration> {
    let secs = match env("TELEGRAM_REPLY_TIMEOUT")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("parsing TELEGRAM_REPLY_TIMEOUT {:?} as seconds", raw))?,
        None => config.session.reply_timeout_secs,
    };
    if secs == 0 {
        anyhow::bail!("reply timeout must be greater than 0");
    }
    Ok(Duration::from_secs(secs))
}

/// Questions for the questionnaire: configured list, or the built-in set.
pub fn resolve_questions(config: &Config) -> Vec<Question> {
    config
        .session
        .questions
        .clone()
        .unwrap_or_else(default_questions)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".parley").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or PARLEY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
