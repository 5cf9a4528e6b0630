use serde::Deserialize;

use rentatool_core::session::SessionId;

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// Inbound user event, keyed by session (chat) id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// A `/command`, lowercased, without the leading slash or bot mention.
    Command { session: SessionId, name: String },
    Text { session: SessionId, text: String },
    /// A button press; `callback_id` must be acknowledged to the transport.
    Callback { session: SessionId, token: String, callback_id: String },
}

/// Maps a raw update to a chat event. Updates without usable content
/// (joins, edits, stickers) decode to `None` and are skipped.
pub fn decode(update: Update) -> Option<ChatEvent> {
    if let Some(callback) = update.callback_query {
        let session = SessionId(callback.message.as_ref()?.chat.id);
        let token = callback.data?;
        return Some(ChatEvent::Callback { session, token, callback_id: callback.id });
    }

    let message = update.message?;
    let session = SessionId(message.chat.id);
    let text = message.text?;
    let trimmed = text.trim();

    if let Some(command) = trimmed.strip_prefix('/') {
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }
        return Some(ChatEvent::Command { session, name });
    }

    if trimmed.is_empty() {
        return None;
    }
    Some(ChatEvent::Text { session, text: trimmed.to_string() })
}
