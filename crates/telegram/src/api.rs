use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use rentatool_core::config::TelegramConfig;
use rentatool_core::session::SessionId;

use crate::outbound::{ChatSender, Invoice, OutboundMessage, SendError};
use crate::poller::UpdateSource;
use crate::update::Update;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bot api transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bot api rejected `{method}`: {description}")]
    Rejected { method: String, description: String },
}

/// Thin client over the Telegram Bot HTTP API.
pub struct BotApi {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    provider_token: SecretString,
    poll_timeout_secs: u64,
}

impl BotApi {
    pub fn new(config: &TelegramConfig) -> Result<Self, ApiError> {
        // The long poll holds the connection open for poll_timeout_secs, so
        // the transport timeout gets a grace margin on top.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            provider_token: config.payment_provider_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self.http.post(self.method_url(method)).json(&body).send().await?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.ok {
            return Err(ApiError::Rejected {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
        envelope.result.ok_or_else(|| ApiError::Rejected {
            method: method.to_string(),
            description: "ok response without a result".to_string(),
        })
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError> {
        let mut body = serde_json::json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = serde_json::json!(offset);
        }
        self.call("getUpdates", body).await
    }

    pub async fn send_message(
        &self,
        session: SessionId,
        message: &OutboundMessage,
    ) -> Result<(), ApiError> {
        let mut body = serde_json::json!({
            "chat_id": session.0,
            "text": message.text,
        });
        if message.html {
            body["parse_mode"] = serde_json::json!("HTML");
        }
        if let Some(keyboard) = &message.keyboard {
            body["reply_markup"] = keyboard.to_reply_markup();
        }
        let _: serde_json::Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    pub async fn send_photo(
        &self,
        session: SessionId,
        message: &OutboundMessage,
        photo_url: &str,
    ) -> Result<(), ApiError> {
        let mut body = serde_json::json!({
            "chat_id": session.0,
            "photo": photo_url,
            "caption": message.text,
        });
        if let Some(keyboard) = &message.keyboard {
            body["reply_markup"] = keyboard.to_reply_markup();
        }
        let _: serde_json::Value = self.call("sendPhoto", body).await?;
        Ok(())
    }

    pub async fn send_invoice_payload(
        &self,
        session: SessionId,
        invoice: &Invoice,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "chat_id": session.0,
            "title": invoice.title,
            "description": invoice.description,
            "payload": invoice.payload,
            "provider_token": self.provider_token.expose_secret(),
            "currency": invoice.currency,
            "prices": [ { "label": invoice.title, "amount": invoice.amount } ],
        });
        let _: serde_json::Value = self.call("sendInvoice", body).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn next_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError> {
        let updates = self.get_updates(offset).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> Result<(), ApiError> {
        self.answer_callback_query(callback_id).await
    }
}

#[async_trait]
impl ChatSender for BotApi {
    async fn send(&self, session: SessionId, message: OutboundMessage) -> Result<(), SendError> {
        let result = match message.photo_url.clone() {
            Some(photo_url) => self.send_photo(session, &message, &photo_url).await,
            None => self.send_message(session, &message).await,
        };
        result.map_err(|error| SendError::Transport(error.to_string()))
    }

    async fn send_invoice(&self, session: SessionId, invoice: Invoice) -> Result<(), SendError> {
        self.send_invoice_payload(session, &invoice)
            .await
            .map_err(|error| SendError::Transport(error.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "none_result")]
    result: Option<T>,
}

fn none_result<T>() -> Option<T> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_success_and_failure() {
        let ok: ApiEnvelope<Vec<Update>> = serde_json::from_value(serde_json::json!({
            "ok": true,
            "result": [ { "update_id": 1, "message": { "chat": { "id": 5 }, "text": "hi" } } ]
        }))
        .expect("envelope");
        assert!(ok.ok);
        assert_eq!(ok.result.expect("result").len(), 1);

        let rejected: ApiEnvelope<Vec<Update>> = serde_json::from_value(serde_json::json!({
            "ok": false,
            "description": "Unauthorized"
        }))
        .expect("envelope");
        assert!(!rejected.ok);
        assert_eq!(rejected.description.as_deref(), Some("Unauthorized"));
    }
}
