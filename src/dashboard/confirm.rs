//! Confirmation gate for destructive actions

use async_trait::async_trait;

pub const DELETE_MOMENT_PROMPT: &str = "Are you sure you want to delete this moment?";
pub const BAN_USER_PROMPT: &str =
    "Are you sure you want to ban this user? This will also revoke their active sessions.";

/// Asks the operator before a destructive action runs
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Answer given up front, e.g. a `?confirm=true` query parameter
#[derive(Debug, Clone, Copy)]
pub struct Preconfirmed(pub bool);

#[async_trait]
impl ConfirmationGate for Preconfirmed {
    async fn confirm(&self, prompt: &str) -> bool {
        if !self.0 {
            tracing::debug!(prompt, "Action not confirmed");
        }
        self.0
    }
}
