//! Direct-message helpers
//!
//! Chats are keyed by an order-independent participant pair. Lookup then
//! create is best-effort: two concurrent first contacts can both create a
//! chat, and reads converge on the oldest one.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{RecordStore, call_with_timeout};
use crate::data::{Chat, ChatMessage, NewChatMessage, ParticipantPair};
use crate::error::{AppError, Result};

/// Find the chat between `a` and `b`, creating it if absent
///
/// # Errors
/// `Validation` for empty IDs or `a == b`; no backend call is made then
pub async fn open_or_create_chat(
    store: Arc<dyn RecordStore>,
    a: &str,
    b: &str,
    timeout: Duration,
) -> Result<Chat> {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return Err(AppError::Validation("chat participants are required".to_string()));
    }
    if a == b {
        return Err(AppError::Validation("cannot open a chat with yourself".to_string()));
    }

    let pair = ParticipantPair::new(a, b);
    if let Some(chat) = call_with_timeout("find_chat", timeout, store.find_chat(&pair)).await? {
        return Ok(chat);
    }

    let chat = call_with_timeout("create_chat", timeout, store.create_chat(&pair)).await?;
    tracing::info!(chat_id = %chat.id, "Chat created");
    Ok(chat)
}

/// Reject blank text before any backend call
pub fn validate_message(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("message text is required".to_string()));
    }
    Ok(())
}

/// Append a message; the timestamp is assigned by the store
pub async fn send_message(
    store: Arc<dyn RecordStore>,
    message: NewChatMessage,
    timeout: Duration,
) -> Result<ChatMessage> {
    validate_message(&message.text)?;
    call_with_timeout("append_message", timeout, store.append_message(message)).await
}
