//! Telegram channel: getUpdates long-poll and sendMessage via the Bot API.

use crate::channels::inbound::InboundMessage;
use crate::channels::transport::{Transport, TransportError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Upper bound for one HTTP round-trip. Must stay above the long-poll cap so a full
/// getUpdates wait is never cut short by the client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(35);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl From<TelegramUpdate> for InboundMessage {
    /// Updates without a text message still map to an entry (empty text) so the offset moves past them.
    fn from(u: TelegramUpdate) -> Self {
        let (conversation_id, text) = match u.message {
            Some(msg) => (msg.chat.id.to_string(), msg.text.unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        InboundMessage {
            sequence_id: u.update_id,
            conversation_id,
            text,
        }
    }
}

/// Telegram Bot API client used as the session transport.
pub struct TelegramChannel {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// Build a client. `base_url` defaults to the public Bot API; `proxy_url` routes all requests through a proxy.
    pub fn new(
        base_url: Option<&str>,
        token: &str,
        proxy_url: Option<&str>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = proxy_url.map(str::trim).filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            base_url,
            token: token.trim().to_string(),
            client: builder.build()?,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Send a text message to a chat via sendMessage. Returns the new message id.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<i64, TransportError> {
        let url = self.method_url("sendMessage");
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self.client.post(&url).json(&body).send().await?;
        let sent: SentMessage = decode_response("sendMessage", res).await?;
        Ok(sent.message_id)
    }

    /// Call getUpdates. `timeout` is only sent when `wait_secs > 0` so a zero wait returns immediately.
    pub async fn get_updates(
        &self,
        offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<TelegramUpdate>, TransportError> {
        let mut url = format!("{}?offset={}", self.method_url("getUpdates"), offset);
        if wait_secs > 0 {
            url = format!("{}&timeout={}", url, wait_secs);
        }
        let res = self.client.get(&url).send().await?;
        decode_response("getUpdates", res).await
    }
}

async fn decode_response<T: DeserializeOwned>(
    method: &str,
    res: reqwest::Response,
) -> Result<T, TransportError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(TransportError::Api(format!(
            "{} failed: {} {}",
            method, status, body
        )));
    }
    let data: ApiResponse<T> = serde_json::from_str(&body)
        .map_err(|e| TransportError::Decode(format!("{} response: {}", method, e)))?;
    if !data.ok {
        return Err(TransportError::Api(format!(
            "{} failed: {}",
            method,
            data.description.unwrap_or_else(|| "ok: false".to_string())
        )));
    }
    data.result
        .ok_or_else(|| TransportError::Decode(format!("{} response has no result", method)))
}

#[async_trait]
impl Transport for TelegramChannel {
    async fn send(&self, conversation_id: &str, text: &str) -> Result<i64, TransportError> {
        self.send_message(conversation_id, text).await
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        wait_secs: u64,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        let updates = self.get_updates(offset, wait_secs).await?;
        log::debug!(
            "telegram getUpdates: offset={} wait={}s -> {} update(s)",
            offset,
            wait_secs,
            updates.len()
        );
        Ok(updates.into_iter().map(InboundMessage::from).collect())
    }
}
