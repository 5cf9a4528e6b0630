//! Telegram Bot API transport: outbound messages/keyboards/invoices, inbound
//! update decoding, and the long-poll runner.

pub mod api;
pub mod outbound;
pub mod poller;
pub mod update;

pub use api::{ApiError, BotApi};
pub use outbound::{ChatSender, InlineButton, InlineKeyboard, Invoice, OutboundMessage, SendError};
pub use poller::{EventRouter, ReconnectPolicy, UpdatePoller, UpdateSource};
pub use update::{decode, CallbackQuery, Chat, ChatEvent, Message, Update};
