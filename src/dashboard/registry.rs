//! Running dashboards, one per signed-in admin

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::controller::{DashboardDeps, DashboardHandle};
use crate::backend::{
    AdminAllowList, AuthSession, BanOperation, LiveBackend, RecordStore, SessionAuth,
};
use crate::config::DashboardConfig;

struct Entry {
    handle: DashboardHandle,
    auth: Arc<SessionAuth>,
    /// Most recent session seen for this admin
    session: AuthSession,
}

pub struct DashboardRegistry {
    store: Arc<dyn RecordStore>,
    ban: Arc<dyn BanOperation>,
    admins: AdminAllowList,
    config: DashboardConfig,
    dashboards: Mutex<HashMap<String, Entry>>,
}

impl DashboardRegistry {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ban: Arc<dyn BanOperation>,
        admins: AdminAllowList,
        config: DashboardConfig,
    ) -> Self {
        Self {
            store,
            ban,
            admins,
            config,
            dashboards: Mutex::new(HashMap::new()),
        }
    }

    /// Dashboard for this session's user, started on first use
    pub async fn get_or_start(&self, session: &AuthSession) -> DashboardHandle {
        let mut dashboards = self.dashboards.lock().await;

        if let Some(entry) = dashboards.get_mut(&session.uid) {
            if !entry.handle.is_closed() {
                entry.auth.sign_in(session.clone());
                entry.session = session.clone();
                return entry.handle.clone();
            }
        }

        let auth = Arc::new(SessionAuth::new(Some(session.clone())));
        let handle = DashboardHandle::spawn(DashboardDeps {
            store: self.store.clone(),
            live: Arc::new(LiveBackend::from_config(&self.config, self.store.clone())),
            auth: auth.clone(),
            ban: self.ban.clone(),
            admins: self.admins.clone(),
            config: self.config.clone(),
        });
        tracing::info!(uid = %session.uid, "Dashboard started for admin");

        dashboards.insert(
            session.uid.clone(),
            Entry {
                handle: handle.clone(),
                auth,
                session: session.clone(),
            },
        );
        handle
    }

    /// Sign the user out of their dashboard and stop it
    ///
    /// Returns `false` if no dashboard was running.
    pub async fn sign_out(&self, uid: &str) -> bool {
        let Some(entry) = self.dashboards.lock().await.remove(uid) else {
            return false;
        };

        entry.auth.sign_out();
        entry.handle.shutdown().await;
        tracing::info!(uid, "Dashboard signed out");
        true
    }

    /// Sign out every dashboard whose token has expired at `now`
    ///
    /// Returns how many were stopped.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<(String, Entry)> = {
            let mut dashboards = self.dashboards.lock().await;
            let uids: Vec<String> = dashboards
                .iter()
                .filter(|(_, entry)| entry.session.is_expired_at(now))
                .map(|(uid, _)| uid.clone())
                .collect();
            uids.into_iter()
                .filter_map(|uid| dashboards.remove(&uid).map(|entry| (uid, entry)))
                .collect()
        };

        for (uid, entry) in &expired {
            entry.auth.sign_out();
            entry.handle.shutdown().await;
            tracing::info!(uid = %uid, "Dashboard session expired");
        }
        expired.len()
    }

    /// Forget dashboards whose task has exited, returning how many went
    pub async fn prune_closed(&self) -> usize {
        let mut dashboards = self.dashboards.lock().await;
        let before = dashboards.len();
        dashboards.retain(|_, entry| !entry.handle.is_closed());
        before - dashboards.len()
    }

    pub async fn len(&self) -> usize {
        self.dashboards.lock().await.len()
    }

    /// Stop every dashboard
    pub async fn shutdown(&self) {
        let entries: Vec<Entry> = self.dashboards.lock().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            entry.auth.sign_out();
            entry.handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBanOperation, MockRecordStore};
    use chrono::Duration;
    use tokio::sync::broadcast;

    fn registry() -> DashboardRegistry {
        let (feed, _) = broadcast::channel(16);
        let mut store = MockRecordStore::new();
        store.expect_changes().returning(move || feed.subscribe());
        store.expect_list_users().returning(|| Ok(Vec::new()));
        store.expect_query_moments().returning(|_| Ok(Vec::new()));
        store.expect_count_moments().returning(|_| Ok(0));

        DashboardRegistry::new(
            Arc::new(store),
            Arc::new(MockBanOperation::new()),
            AdminAllowList::new(["admin-1", "admin-2"]),
            DashboardConfig::default(),
        )
    }

    fn session(uid: &str, expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            uid: uid.to_string(),
            email: None,
            admin: true,
            token: None,
            expires_at: Some(expires_at),
        }
    }

    #[tokio::test]
    async fn expired_dashboards_are_signed_out() {
        let registry = registry();
        let now = Utc::now();
        let expiring = registry
            .get_or_start(&session("admin-1", now + Duration::minutes(5)))
            .await;
        registry
            .get_or_start(&session("admin-2", now + Duration::hours(1)))
            .await;

        assert_eq!(registry.prune_expired(now).await, 0);
        assert_eq!(registry.prune_expired(now + Duration::minutes(10)).await, 1);

        assert_eq!(registry.len().await, 1);
        assert!(expiring.next_page().await.is_err());
    }

    #[tokio::test]
    async fn fresh_token_extends_dashboard() {
        let registry = registry();
        let now = Utc::now();
        let first = registry
            .get_or_start(&session("admin-1", now + Duration::minutes(5)))
            .await;
        let again = registry
            .get_or_start(&session("admin-1", now + Duration::minutes(30)))
            .await;

        assert_eq!(registry.prune_expired(now + Duration::minutes(10)).await, 0);
        assert_eq!(registry.len().await, 1);
        assert!(!first.is_closed());
        assert!(!again.is_closed());
    }
}
