//! Backend contracts
//!
//! The narrow interfaces the dashboard depends on:
//! - [`RecordStore`]: queries, counts and mutations
//! - [`LiveQuery`]: live listeners pushing snapshots
//! - [`AuthProvider`]: current identity and auth-state changes
//! - [`BanOperation`]: the privileged `banUser` callable

mod auth;
mod ban;
mod live;
mod query;
mod store;

pub use auth::{AdminAllowList, AuthProvider, AuthSession, SessionAuth, check_access};
pub use ban::{
    BanOperation, BanRequest, BanResponse, LocalBanFunction, RemoteBanFunction, ban_operation,
};
pub use live::{
    ChangeFeedListener, LiveBackend, LiveQuery, LiveSource, PollingListener, SnapshotSink,
    Subscription,
};
pub use query::*;
pub use store::{RecordStore, call_with_timeout};

#[cfg(test)]
pub use ban::MockBanOperation;
#[cfg(test)]
pub use store::MockRecordStore;
