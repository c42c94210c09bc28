//! Communication channels (e.g. Telegram).
//!
//! The `Transport` trait is the port the session engine drives; `TelegramChannel` is the Bot API
//! implementation and `ScriptedTransport` an in-memory stand-in for tests and dry runs.

mod inbound;
mod scripted;
mod telegram;
mod transport;

pub use inbound::InboundMessage;
pub use scripted::ScriptedTransport;
pub use telegram::{TelegramChannel, TelegramUpdate, TELEGRAM_API_BASE};
pub use transport::{Transport, TransportError};
