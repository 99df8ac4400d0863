//! SQLite database operations
//!
//! All database access goes through this module.
//! Every committed write publishes a [`ChangeEvent`] so live
//! listeners can re-run their queries.

use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use tokio::sync::broadcast;

use super::models::*;
use crate::backend::{CaptionRange, CursorKey, Direction, OrderField, QueryDefinition};
use crate::error::AppError;

/// Buffered change events per subscriber before it starts lagging
const CHANGE_FEED_CAPACITY: usize = 256;

const MOMENT_SELECT: &str = r#"
    SELECT m.id, m.caption, m.user_id, m.image_url, m.created_at,
        (SELECT COUNT(*) FROM moment_likes l WHERE l.moment_id = m.id) AS like_count,
        (SELECT COUNT(*) FROM moment_comments c WHERE c.moment_id = m.id) AS comment_count
    FROM moments m
"#;

/// Database connection pool wrapper plus its change feed.
pub struct Database {
    pool: Pool<Sqlite>,
    changes: broadcast::Sender<ChangeEvent>,
}

fn order_column(field: OrderField) -> &'static str {
    match field {
        OrderField::CreatedAt => "m.created_at",
        OrderField::Caption => "m.caption_key",
    }
}

fn push_caption_range(builder: &mut QueryBuilder<'_, Sqlite>, range: &CaptionRange) {
    builder
        .push(" AND m.caption_key >= ")
        .push_bind(range.start.clone())
        .push(" AND m.caption_key < ")
        .push_bind(range.end.clone());
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { pool, changes })
    }

    /// Subscribe to change events published after committed writes
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn publish(&self, collection: Collection) {
        // No receivers is not an error: nobody is listening yet.
        let _ = self.changes.send(ChangeEvent::new(collection));
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert or replace a user record
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, created_at, last_sign_in_at,
                disabled, is_banned, banned_at, banned_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                last_sign_in_at = excluded.last_sign_in_at,
                disabled = excluded.disabled,
                is_banned = excluded.is_banned,
                banned_at = excluded.banned_at,
                banned_by = excluded.banned_by
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.created_at)
        .bind(user.last_sign_in_at)
        .bind(user.disabled)
        .bind(user.is_banned)
        .bind(user.banned_at)
        .bind(&user.banned_by)
        .execute(&self.pool)
        .await?;

        self.publish(Collection::Users);
        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// All users, newest first
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(users)
    }

    /// Record a successful sign-in and issue a refresh session
    ///
    /// # Returns
    /// ID of the new refresh session
    pub async fn record_sign_in(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let session_id = EntityId::new().0;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET last_sign_in_at = ? WHERE id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        sqlx::query("INSERT INTO refresh_sessions (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&session_id)
            .bind(user_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.publish(Collection::Users);
        Ok(session_id)
    }

    /// Count refresh sessions that have not been revoked
    pub async fn count_active_sessions(&self, user_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM refresh_sessions WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Ban a user: disable the account, revoke every refresh session and
    /// mark the record banned, all in one transaction.
    ///
    /// # Errors
    /// Returns `NotFound` if the user does not exist
    pub async fn ban_user(&self, user_id: &str, banned_by: &str) -> Result<User, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let disabled = sqlx::query("UPDATE users SET disabled = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if disabled.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        let revoked = sqlx::query(
            "UPDATE refresh_sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET is_banned = 1, banned_at = ?, banned_by = ? WHERE id = ?")
            .bind(now)
            .bind(banned_by)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id,
            banned_by,
            revoked_sessions = revoked.rows_affected(),
            "User banned"
        );
        self.publish(Collection::Users);
        Ok(user)
    }

    // =========================================================================
    // Moments
    // =========================================================================

    /// Insert a moment with a fresh ID
    pub async fn insert_moment(&self, new: NewMoment) -> Result<Moment, AppError> {
        let id = EntityId::new().0;
        let key = new.caption.as_deref().map(caption_key);

        sqlx::query(
            "INSERT INTO moments (id, caption, caption_key, user_id, image_url, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.caption)
        .bind(&key)
        .bind(&new.user_id)
        .bind(&new.image_url)
        .bind(new.created_at)
        .execute(&self.pool)
        .await?;

        self.publish(Collection::Moments);
        Ok(Moment {
            id,
            caption: new.caption,
            user_id: new.user_id,
            image_url: new.image_url,
            like_count: 0,
            comment_count: 0,
            created_at: new.created_at,
        })
    }

    pub async fn add_like(&self, moment_id: &str, user_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO moment_likes (moment_id, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(moment_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.publish(Collection::Moments);
        Ok(())
    }

    pub async fn add_comment(
        &self,
        moment_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;
        sqlx::query(
            "INSERT INTO moment_comments (id, moment_id, user_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(moment_id)
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.publish(Collection::Moments);
        Ok(id)
    }

    pub async fn get_moment(&self, id: &str) -> Result<Option<Moment>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(MOMENT_SELECT);
        builder.push(" WHERE m.id = ").push_bind(id.to_string());

        let moment = builder
            .build_query_as::<Moment>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(moment)
    }

    /// Fetch one window of moments
    ///
    /// Applies the optional caption range, then the start-after cursor
    /// (compared on `(sort key, id)`), then the ordering and limit.
    ///
    /// # Errors
    /// Returns `Validation` if the cursor was captured under a different ordering
    pub async fn query_moments(&self, query: &QueryDefinition) -> Result<Vec<Moment>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(MOMENT_SELECT);
        builder.push(" WHERE 1 = 1");

        if let Some(range) = &query.range {
            push_caption_range(&mut builder, range);
        }

        let column = order_column(query.order.field);
        let (comparison, direction) = match query.order.direction {
            Direction::Ascending => (">", "ASC"),
            Direction::Descending => ("<", "DESC"),
        };

        if let Some(cursor) = &query.start_after {
            builder.push(format!(" AND ({column}, m.id) {comparison} ("));
            match (&cursor.key, query.order.field) {
                (CursorKey::CreatedAt(at), OrderField::CreatedAt) => {
                    builder.push_bind(*at);
                }
                (CursorKey::Caption(key), OrderField::Caption) => {
                    builder.push_bind(key.clone());
                }
                _ => {
                    return Err(AppError::Validation(
                        "cursor does not match query ordering".to_string(),
                    ));
                }
            }
            builder
                .push(", ")
                .push_bind(cursor.id.clone())
                .push(")");
        }

        builder.push(format!(
            " ORDER BY {column} {direction}, m.id {direction} LIMIT "
        ));
        builder.push_bind(query.limit as i64);

        let moments = builder
            .build_query_as::<Moment>()
            .fetch_all(&self.pool)
            .await?;

        Ok(moments)
    }

    /// Count moments server-side, optionally restricted to a caption range
    pub async fn count_moments(&self, range: Option<&CaptionRange>) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM moments m WHERE 1 = 1");
        if let Some(range) = range {
            push_caption_range(&mut builder, range);
        }

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    /// Delete a moment together with its likes and comments
    ///
    /// # Returns
    /// `false` if no moment had this ID
    pub async fn delete_moment(&self, id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM moment_likes WHERE moment_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM moment_comments WHERE moment_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM moments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.publish(Collection::Moments);
        }
        Ok(deleted)
    }

    // =========================================================================
    // Chats
    // =========================================================================

    /// Find the chat for a participant pair
    ///
    /// If concurrent first contacts created duplicates, the oldest wins.
    pub async fn find_chat(&self, pair: &ParticipantPair) -> Result<Option<Chat>, AppError> {
        let chat = sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE member_low = ? AND member_high = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&self.pool)
        .await?;

        Ok(chat)
    }

    pub async fn get_chat(&self, id: &str) -> Result<Option<Chat>, AppError> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chat)
    }

    /// Chats `user_id` takes part in, newest first
    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, AppError> {
        let chats = sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE member_low = ? OR member_high = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chats)
    }

    pub async fn create_chat(&self, pair: &ParticipantPair) -> Result<Chat, AppError> {
        let chat = Chat {
            id: EntityId::new().0,
            member_low: pair.low().to_string(),
            member_high: pair.high().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO chats (id, member_low, member_high, created_at) VALUES (?, ?, ?, ?)")
            .bind(&chat.id)
            .bind(&chat.member_low)
            .bind(&chat.member_high)
            .bind(chat.created_at)
            .execute(&self.pool)
            .await?;

        self.publish(Collection::Chats);
        Ok(chat)
    }

    /// Messages of a chat, oldest first
    pub async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE chat_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Append a message with a server-assigned timestamp
    ///
    /// # Errors
    /// Returns `NotFound` if the chat does not exist
    pub async fn append_message(&self, new: NewChatMessage) -> Result<ChatMessage, AppError> {
        if self.get_chat(&new.chat_id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let message = ChatMessage {
            id: EntityId::new().0,
            chat_id: new.chat_id,
            sender_id: new.sender_id,
            sender_email: new.sender_email,
            text: new.text,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, chat_id, sender_id, sender_email, text, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.sender_email)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        self.publish(Collection::Messages(message.chat_id.clone()));
        Ok(message)
    }
}
