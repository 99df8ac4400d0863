//! Auth state and the admin access check

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::auth::Session;
use crate::error::AppError;

/// The signed-in identity as seen by the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    pub uid: String,
    pub email: Option<String>,
    /// `admin` custom claim, required by the privileged callables
    pub admin: bool,
    /// Bearer token forwarded to remote callables
    #[serde(skip)]
    pub token: Option<String>,
    /// When the backing token stops being valid
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn from_session(session: &Session, token: Option<String>) -> Self {
        Self {
            uid: session.uid.clone(),
            email: session.email.clone(),
            admin: session.admin,
            token,
            expires_at: Some(session.expires_at),
        }
    }

    /// Whether the backing token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Source of the current identity and its changes
pub trait AuthProvider: Send + Sync {
    fn current_session(&self) -> Option<AuthSession>;

    /// Fires on every sign-in / sign-out
    fn watch(&self) -> watch::Receiver<Option<AuthSession>>;
}

/// In-process auth state fed by the HTTP layer
pub struct SessionAuth {
    state: watch::Sender<Option<AuthSession>>,
}

impl SessionAuth {
    pub fn new(initial: Option<AuthSession>) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Watchers are only notified when the identity actually changes
    pub fn sign_in(&self, session: AuthSession) {
        self.state.send_if_modified(|current| {
            if current.as_ref() == Some(&session) {
                return false;
            }
            *current = Some(session);
            true
        });
    }

    pub fn sign_out(&self) {
        self.state.send_replace(None);
    }
}

impl AuthProvider for SessionAuth {
    fn current_session(&self) -> Option<AuthSession> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }
}

/// Immutable set of UIDs allowed into the dashboard
#[derive(Debug, Clone, Default)]
pub struct AdminAllowList(Arc<HashSet<String>>);

impl AdminAllowList {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let uids = uids
            .into_iter()
            .map(|uid| uid.as_ref().trim().to_string())
            .filter(|uid| !uid.is_empty())
            .collect();
        Self(Arc::new(uids))
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.0.contains(uid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Gate dashboard access
///
/// # Errors
/// `Unauthorized` when nobody is signed in, `Forbidden` when the
/// signed-in user is not on the allow-list
pub fn check_access<'a>(
    session: Option<&'a AuthSession>,
    allow_list: &AdminAllowList,
) -> Result<&'a AuthSession, AppError> {
    let session = session.ok_or(AppError::Unauthorized)?;
    if !allow_list.contains(&session.uid) {
        return Err(AppError::Forbidden);
    }
    Ok(session)
}
