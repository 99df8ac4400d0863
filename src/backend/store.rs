//! Record store contract
//!
//! The dashboard only talks to persistence through [`RecordStore`].
//! `data::Database` is the production implementation.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::query::{CaptionRange, QueryDefinition};
use crate::data::{ChangeEvent, Chat, ChatMessage, Database, Moment, NewChatMessage, ParticipantPair, User};
use crate::error::{AppError, Result};
use crate::metrics;

/// Queries and mutations the dashboard needs from the backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query_moments(&self, query: &QueryDefinition) -> Result<Vec<Moment>>;

    /// Server-side count of moments, optionally restricted to a caption range
    async fn count_moments(&self, range: Option<CaptionRange>) -> Result<u64>;

    async fn get_moment(&self, id: &str) -> Result<Option<Moment>>;

    /// Returns `false` when nothing was deleted
    async fn delete_moment(&self, id: &str) -> Result<bool>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn find_chat(&self, pair: &ParticipantPair) -> Result<Option<Chat>>;

    async fn create_chat(&self, pair: &ParticipantPair) -> Result<Chat>;

    /// Every chat `user_id` is a member of, newest first
    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>>;

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>>;

    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage>;

    /// Change events published after committed writes
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[async_trait]
impl RecordStore for Database {
    async fn query_moments(&self, query: &QueryDefinition) -> Result<Vec<Moment>> {
        Database::query_moments(self, query).await
    }

    async fn count_moments(&self, range: Option<CaptionRange>) -> Result<u64> {
        Database::count_moments(self, range.as_ref()).await
    }

    async fn get_moment(&self, id: &str) -> Result<Option<Moment>> {
        Database::get_moment(self, id).await
    }

    async fn delete_moment(&self, id: &str) -> Result<bool> {
        Database::delete_moment(self, id).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Database::list_users(self).await
    }

    async fn find_chat(&self, pair: &ParticipantPair) -> Result<Option<Chat>> {
        Database::find_chat(self, pair).await
    }

    async fn create_chat(&self, pair: &ParticipantPair) -> Result<Chat> {
        Database::create_chat(self, pair).await
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>> {
        Database::list_chats(self, user_id).await
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        Database::list_messages(self, chat_id).await
    }

    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage> {
        Database::append_message(self, message).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.subscribe_changes()
    }
}

/// Run one backend call under a deadline and record its outcome
///
/// A call that exceeds `limit` fails with [`AppError::Timeout`] like any
/// other backend error.
pub async fn call_with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Backend call timed out");
            Err(AppError::Timeout(operation.to_string()))
        }
    };

    let status = match &outcome {
        Ok(_) => "success",
        Err(AppError::Timeout(_)) => "timeout",
        Err(_) => "error",
    };
    metrics::observe_backend_call(operation, status, started.elapsed());

    outcome
}
