//! Render-ready dashboard state

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

use super::pager::ViewMode;
use crate::data::{Chat, ChatMessage, Moment, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Loading,
    Ready,
    SignedOut,
    /// Signed in, but not on the allow-list
    AccessDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Operator-visible message raised by an action or a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Most recent notices, oldest evicted first
#[derive(Debug, Clone)]
pub struct Notices {
    capacity: usize,
    next_id: u64,
    items: VecDeque<Notice>,
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 0,
            items: VecDeque::new(),
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message.into());
    }

    fn push(&mut self, level: NoticeLevel, message: String) {
        self.next_id += 1;
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(Notice {
            id: self.next_id,
            level,
            message,
            at: Utc::now(),
        });
    }

    pub fn to_vec(&self) -> Vec<Notice> {
        self.items.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentRow {
    #[serde(flatten)]
    pub moment: Moment,
    /// A delete is in flight
    pub busy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
    /// A ban is in flight
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatPanel {
    pub chat: Chat,
    pub target_id: String,
    /// Display name of the other participant, falling back to email
    pub target_name: String,
    pub messages: Vec<ChatMessage>,
    pub stale: bool,
}

impl ChatPanel {
    /// Label for `target_id` from the loaded users
    ///
    /// Uses the display name, then the email, then the raw ID when the user
    /// is not loaded.
    pub fn resolve_target_name(users: &[User], target_id: &str) -> String {
        let Some(user) = users.iter().find(|user| user.id == target_id) else {
            return target_id.to_string();
        };
        match user.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if !user.email.is_empty() => user.email.clone(),
            _ => target_id.to_string(),
        }
    }
}

/// User statistics shown above the tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: usize,
    /// Unfiltered moment count, from the last default-mode aggregate
    pub total_moments: Option<u64>,
    /// Signed in since 00:00 UTC today
    pub active_today: usize,
    /// Created since Monday 00:00 UTC
    pub new_this_week: usize,
}

impl UserStats {
    pub fn compute(users: &[User], total_moments: Option<u64>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let week_start =
            today - Duration::days(i64::from(now.weekday().num_days_from_monday()));

        Self {
            total_users: users.len(),
            total_moments,
            active_today: users
                .iter()
                .filter(|u| u.last_sign_in_at.is_some_and(|at| at >= today))
                .count(),
            new_this_week: users.iter().filter(|u| u.created_at >= week_start).count(),
        }
    }
}

/// Everything a client needs to render the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub status: ViewStatus,
    pub mode: ViewMode,
    /// Raw search box content, including uncommitted keystrokes
    pub search_input: String,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    pub can_go_previous: bool,
    /// Aggregate count for the current mode
    pub total_count: Option<u64>,
    pub moments_loading: bool,
    /// The moments listener failed; rows are the last good snapshot
    pub moments_stale: bool,
    pub moments: Vec<MomentRow>,
    pub users_stale: bool,
    pub users: Vec<UserRow>,
    pub stats: UserStats,
    pub chat: Option<ChatPanel>,
    pub notices: Vec<Notice>,
}

impl DashboardView {
    pub fn initial(page_size: usize) -> Self {
        Self {
            status: ViewStatus::Loading,
            mode: ViewMode::Default,
            search_input: String::new(),
            page: 1,
            page_size,
            has_more: false,
            can_go_previous: false,
            total_count: None,
            moments_loading: true,
            moments_stale: false,
            moments: Vec::new(),
            users_stale: false,
            users: Vec::new(),
            stats: UserStats::default(),
            chat: None,
            notices: Vec::new(),
        }
    }
}
