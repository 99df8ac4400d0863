//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Moment
// =============================================================================

/// A moment posted by a user
///
/// Like and comment counts are derived from the attached
/// `moment_likes` / `moment_comments` rows at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Moment {
    pub id: String,
    pub caption: Option<String>,
    /// Author user ID
    pub user_id: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a moment
#[derive(Debug, Clone)]
pub struct NewMoment {
    pub caption: Option<String>,
    pub user_id: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Normalized caption used for prefix search and caption ordering
pub fn caption_key(caption: &str) -> String {
    caption.to_lowercase()
}

// =============================================================================
// User
// =============================================================================

/// An application user, as issued by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    /// Account disabled at the identity provider
    pub disabled: bool,
    pub is_banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    /// Admin UID that issued the ban
    pub banned_by: Option<String>,
}

impl User {
    /// Create a fresh, unbanned user record
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            created_at,
            last_sign_in_at: None,
            disabled: false,
            is_banned: false,
            banned_at: None,
            banned_by: None,
        }
    }
}

/// Refresh session issued to a user
///
/// Revoking every session forces the user to sign in again.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshSession {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Chats
// =============================================================================

/// Order-independent pair of chat participants
///
/// `ParticipantPair::new(a, b) == ParticipantPair::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: String,
    high: String,
}

impl ParticipantPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }
}

/// A direct-message thread between two users
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: String,
    pub member_low: String,
    pub member_high: String,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn participants(&self) -> ParticipantPair {
        ParticipantPair::new(self.member_low.clone(), self.member_high.clone())
    }
}

/// A single message in a chat (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_email: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to append a message
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub sender_email: Option<String>,
    pub text: String,
}

// =============================================================================
// Change feed
// =============================================================================

/// Collections that publish change events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collection {
    Moments,
    Users,
    Chats,
    /// Messages of one chat
    Messages(String),
}

/// Published after every committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
}

impl ChangeEvent {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }
}
