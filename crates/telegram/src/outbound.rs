use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use rentatool_core::session::SessionId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("chat transport send failure: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub label: String,
    /// Opaque token echoed back in the callback event.
    pub token: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self { label: label.into(), token: token.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// One button per row, the common shape for option lists.
    pub fn single_column(buttons: Vec<InlineButton>) -> Self {
        Self { rows: buttons.into_iter().map(|button| vec![button]).collect() }
    }

    pub fn to_reply_markup(&self) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| {
                        serde_json::json!({
                            "text": button.label,
                            "callback_data": button.token,
                        })
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({ "inline_keyboard": rows })
    }
}

/// One outbound chat primitive: text (optionally HTML), an optional image,
/// and an optional inline keyboard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub html: bool,
    pub photo_url: Option<String>,
    pub keyboard: Option<InlineKeyboard>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self { text: text.into(), html: true, ..Self::default() }
    }

    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// The payment-gateway hand-off payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoice {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    /// Amount in the currency's smallest units.
    pub amount: i64,
}

/// Outbound side of the messaging transport, as seen by the orchestrator.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, session: SessionId, message: OutboundMessage) -> Result<(), SendError>;
    async fn send_invoice(&self, session: SessionId, invoice: Invoice) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_markup_matches_bot_api_shape() {
        let keyboard = InlineKeyboard::new()
            .row(vec![
                InlineButton::new("Pickup", "pickup"),
                InlineButton::new("Delivery", "delivery"),
            ])
            .row(vec![InlineButton::new("Cancel", "cancel")]);

        let markup = keyboard.to_reply_markup();
        assert_eq!(markup["inline_keyboard"][0][1]["text"], "Delivery");
        assert_eq!(markup["inline_keyboard"][0][1]["callback_data"], "delivery");
        assert_eq!(markup["inline_keyboard"][1][0]["callback_data"], "cancel");
    }

    #[test]
    fn single_column_builds_one_button_per_row() {
        let keyboard = InlineKeyboard::single_column(vec![
            InlineButton::new("A", "a"),
            InlineButton::new("B", "b"),
        ]);
        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[1][0].token, "b");
    }
}
