//! Admin dashboard
//!
//! - Cursor pager and search debouncer derive the moments query
//! - Listener slots keep one generation-tagged live subscription per view
//! - Aggregate counter keeps the server-side count fresh
//! - The controller task owns all state and publishes a render-ready view

mod chat;
mod confirm;
mod controller;
mod counter;
mod debounce;
mod export;
mod listener;
mod pager;
mod registry;
mod view;

pub use chat::{open_or_create_chat, send_message, validate_message};
pub use confirm::{BAN_USER_PROMPT, ConfirmationGate, DELETE_MOMENT_PROMPT, Preconfirmed};
pub use controller::{DashboardDeps, DashboardHandle, MutationOutcome};
pub use counter::AggregateCounter;
pub use debounce::SearchDebouncer;
pub use export::{CsvExport, CsvRow};
pub use listener::{Generation, ListenerSlot};
pub use pager::{PageState, ViewMode, build_query};
pub use registry::DashboardRegistry;
pub use view::{
    ChatPanel, DashboardView, MomentRow, Notice, NoticeLevel, UserRow, UserStats, ViewStatus,
};
