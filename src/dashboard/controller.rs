//! Dashboard controller
//!
//! One task owns all dashboard state and processes commands from
//! [`DashboardHandle`]s, listener snapshots, timer expiries and mutation
//! completions one at a time. The render-ready [`DashboardView`] is
//! published through a `watch` channel after every step.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};

use super::chat;
use super::confirm::{BAN_USER_PROMPT, ConfirmationGate, DELETE_MOMENT_PROMPT};
use super::counter::AggregateCounter;
use super::debounce::SearchDebouncer;
use super::export::CsvExport;
use super::listener::{Generation, ListenerSlot};
use super::pager::{PageState, ViewMode};
use super::view::{ChatPanel, DashboardView, MomentRow, Notices, UserRow, UserStats, ViewStatus};
use crate::backend::{
    AdminAllowList, AuthProvider, AuthSession, BanOperation, BanRequest, BanResponse, LiveBackend,
    LiveQuery, LiveSource, RecordStore, SnapshotSink, call_with_timeout, check_access,
};
use crate::config::DashboardConfig;
use crate::data::{Chat, ChatMessage, Collection, Moment, NewChatMessage, User};
use crate::error::{AppError, Result};
use crate::metrics::{DASHBOARDS_ACTIVE, record_mutation};

const COMMAND_BUFFER: usize = 64;

/// Everything a dashboard needs from the outside world
#[derive(Clone)]
pub struct DashboardDeps {
    pub store: Arc<dyn RecordStore>,
    pub live: Arc<LiveBackend>,
    pub auth: Arc<dyn AuthProvider>,
    pub ban: Arc<dyn BanOperation>,
    pub admins: AdminAllowList,
    pub config: DashboardConfig,
}

/// Result of a confirmed, guarded mutation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Completed { message: String },
    /// The confirmation gate said no; nothing was sent
    Declined,
    /// The same record already has this action in flight
    AlreadyInProgress,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    SearchInput(String, Reply<()>),
    NextPage(Reply<()>),
    PreviousPage(Reply<()>),
    RefreshCount(Reply<u64>),
    DeleteMoment { id: String, reply: Reply<MutationOutcome> },
    BanUser { user_id: String, reply: Reply<MutationOutcome> },
    OpenChat { target: String, reply: Reply<Chat> },
    CloseChat(Reply<()>),
    SendMessage { text: String, reply: Reply<ChatMessage> },
    Shutdown,
}

enum Event {
    MomentsSnapshot(Generation, Result<Vec<Moment>>),
    UsersSnapshot(Generation, Result<Vec<User>>),
    MessagesSnapshot(Generation, Result<Vec<ChatMessage>>),
    SearchExpired(u64),
    CountLoaded(u64, Result<u64>),
    /// Unfiltered count requested outside default mode
    TotalLoaded(u64, Result<u64>),
    DeleteFinished { id: String, result: Result<bool>, reply: Reply<MutationOutcome> },
    BanFinished { user_id: String, result: Result<BanResponse>, reply: Reply<MutationOutcome> },
    ChatOpened { seq: u64, target: String, result: Result<Chat>, reply: Reply<Chat> },
    MessageSent { result: Result<ChatMessage>, reply: Reply<ChatMessage> },
}

/// Forwards listener output into the event loop, tagged with its generation
struct EventSink<T> {
    events: mpsc::UnboundedSender<Event>,
    generation: Generation,
    wrap: fn(Generation, Result<Vec<T>>) -> Event,
}

impl<T: Send + 'static> SnapshotSink<T> for EventSink<T> {
    fn on_snapshot(&self, items: Vec<T>) {
        let _ = self.events.send((self.wrap)(self.generation, Ok(items)));
    }

    fn on_error(&self, error: AppError) {
        let _ = self.events.send((self.wrap)(self.generation, Err(error)));
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable API to a running dashboard
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<DashboardView>,
}

impl DashboardHandle {
    /// Start a dashboard task
    pub fn spawn(deps: DashboardDeps) -> Self {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view) = watch::channel(DashboardView::initial(deps.config.page_size));
        let controller = Controller::new(deps, commands, view_tx);
        tokio::spawn(controller.run());

        Self {
            commands: commands_tx,
            view,
        }
    }

    /// Latest published view
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Receiver that observes every published view
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AppError::DashboardClosed)?;
        response.await.map_err(|_| AppError::DashboardClosed)?
    }

    /// Feed a search keystroke. Committed after the quiet period.
    pub async fn search_input(&self, raw: impl Into<String>) -> Result<()> {
        let raw = raw.into();
        self.request(|reply| Command::SearchInput(raw, reply)).await
    }

    pub async fn next_page(&self) -> Result<()> {
        self.request(Command::NextPage).await
    }

    /// No-op on page 1
    pub async fn previous_page(&self) -> Result<()> {
        self.request(Command::PreviousPage).await
    }

    /// Re-count the current mode's records on the backend
    pub async fn refresh_count(&self) -> Result<u64> {
        self.request(Command::RefreshCount).await
    }

    /// Delete a moment after confirmation
    pub async fn delete_moment(
        &self,
        id: impl Into<String>,
        gate: &dyn ConfirmationGate,
    ) -> Result<MutationOutcome> {
        let id = id.into();
        if !gate.confirm(DELETE_MOMENT_PROMPT).await {
            return Ok(MutationOutcome::Declined);
        }
        self.request(|reply| Command::DeleteMoment { id, reply }).await
    }

    /// Ban a user after confirmation, through the privileged ban operation
    pub async fn ban_user(
        &self,
        user_id: impl Into<String>,
        gate: &dyn ConfirmationGate,
    ) -> Result<MutationOutcome> {
        let user_id = user_id.into();
        if !gate.confirm(BAN_USER_PROMPT).await {
            return Ok(MutationOutcome::Declined);
        }
        self.request(|reply| Command::BanUser { user_id, reply }).await
    }

    /// Open (or create) the chat between the signed-in admin and `target`
    pub async fn open_chat(&self, target: impl Into<String>) -> Result<Chat> {
        let target = target.into();
        self.request(|reply| Command::OpenChat { target, reply }).await
    }

    pub async fn close_chat(&self) -> Result<()> {
        self.request(Command::CloseChat).await
    }

    /// Send a message in the open chat
    pub async fn send_message(&self, text: impl Into<String>) -> Result<ChatMessage> {
        let text = text.into();
        self.request(|reply| Command::SendMessage { text, reply }).await
    }

    /// Export the currently loaded page
    pub fn export_csv(&self) -> CsvExport {
        let view = self.view.borrow();
        let moments: Vec<Moment> = view.moments.iter().map(|row| row.moment.clone()).collect();
        let users: Vec<User> = view.users.iter().map(|row| row.user.clone()).collect();
        CsvExport::from_page(&moments, &users, Utc::now().date_naive())
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

// =============================================================================
// Controller
// =============================================================================

struct Controller {
    deps: DashboardDeps,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,
    events_tx: mpsc::UnboundedSender<Event>,
    auth_changes: watch::Receiver<Option<AuthSession>>,
    view_tx: watch::Sender<DashboardView>,

    status: ViewStatus,
    session: Option<AuthSession>,

    pager: PageState,
    debouncer: SearchDebouncer,
    search_input: String,
    counter: AggregateCounter,
    count_waiters: HashMap<u64, Reply<u64>>,
    total_moments: Option<u64>,
    total_seq: u64,

    moments_slot: ListenerSlot,
    moments: Vec<Moment>,
    moments_loading: bool,
    moments_stale: bool,

    users_slot: ListenerSlot,
    users: Vec<User>,
    users_stale: bool,

    messages_slot: ListenerSlot,
    chat: Option<ChatPanel>,
    chat_seq: u64,

    deleting: HashSet<String>,
    banning: HashSet<String>,
    notices: Notices,
}

impl Controller {
    fn new(
        deps: DashboardDeps,
        commands: mpsc::Receiver<Command>,
        view_tx: watch::Sender<DashboardView>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let auth_changes = deps.auth.watch();
        let config = &deps.config;

        Self {
            pager: PageState::new(config.page_size),
            debouncer: SearchDebouncer::new(config.search_debounce()),
            notices: Notices::new(config.notice_capacity),
            deps,
            commands,
            events,
            events_tx,
            auth_changes,
            view_tx,
            status: ViewStatus::Loading,
            session: None,
            search_input: String::new(),
            counter: AggregateCounter::new(),
            count_waiters: HashMap::new(),
            total_moments: None,
            total_seq: 0,
            moments_slot: ListenerSlot::new("moments"),
            moments: Vec::new(),
            moments_loading: false,
            moments_stale: false,
            users_slot: ListenerSlot::new("users"),
            users: Vec::new(),
            users_stale: false,
            messages_slot: ListenerSlot::new("messages"),
            chat: None,
            chat_seq: 0,
            deleting: HashSet::new(),
            banning: HashSet::new(),
        }
    }

    async fn run(mut self) {
        DASHBOARDS_ACTIVE.inc();
        let initial = self.auth_changes.borrow_and_update().clone();
        self.apply_auth(initial);
        self.publish();

        let mut auth_open = true;
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events.recv() => self.handle_event(event),
                changed = self.auth_changes.changed(), if auth_open => match changed {
                    Ok(()) => {
                        let session = self.auth_changes.borrow_and_update().clone();
                        self.apply_auth(session);
                    }
                    Err(_) => {
                        auth_open = false;
                        self.apply_auth(None);
                    }
                },
            }
            self.publish();
        }

        self.teardown();
        self.publish();
        DASHBOARDS_ACTIVE.dec();
        tracing::info!("Dashboard controller stopped");
    }

    fn is_active(&self) -> bool {
        matches!(self.status, ViewStatus::Loading | ViewStatus::Ready)
    }

    fn ensure_active(&self) -> Result<()> {
        match self.status {
            ViewStatus::Loading | ViewStatus::Ready => Ok(()),
            ViewStatus::SignedOut => Err(AppError::Unauthorized),
            ViewStatus::AccessDenied => Err(AppError::Forbidden),
        }
    }

    // =========================================================================
    // Auth
    // =========================================================================

    fn apply_auth(&mut self, session: Option<AuthSession>) {
        let access = check_access(session.as_ref(), &self.deps.admins).map(|_| ());
        match access {
            Ok(()) => {
                let was_active = self.is_active() && self.session.is_some();
                self.session = session;
                if !was_active {
                    self.start();
                }
            }
            Err(AppError::Forbidden) => {
                self.teardown();
                if self.status != ViewStatus::AccessDenied {
                    self.notices.error(AppError::Forbidden.to_string());
                }
                self.session = session;
                self.status = ViewStatus::AccessDenied;
            }
            Err(_) => {
                self.teardown();
                self.session = None;
                self.status = ViewStatus::SignedOut;
            }
        }
    }

    fn start(&mut self) {
        tracing::info!(
            uid = self.session.as_ref().map(|s| s.uid.as_str()),
            "Dashboard started"
        );
        self.status = ViewStatus::Loading;
        self.install_users_listener();
        self.install_moments_listener();
        self.refresh_count(None);
    }

    /// Detach every listener and forget loaded data
    fn teardown(&mut self) {
        self.moments_slot.cancel();
        self.users_slot.cancel();
        self.messages_slot.cancel();
        self.debouncer.cancel();
        self.moments.clear();
        self.users.clear();
        self.chat = None;
        self.moments_loading = false;
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    fn install_moments_listener(&mut self) {
        let query = self.pager.query();
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let live = self.deps.live.clone();
        let events = self.events_tx.clone();

        self.moments_slot.install(move |generation| {
            let source = LiveSource::new("moments", vec![Collection::Moments], move || {
                let store = store.clone();
                let query = query.clone();
                async move {
                    call_with_timeout("query_moments", timeout, store.query_moments(&query)).await
                }
            });
            live.subscribe(
                source,
                Arc::new(EventSink {
                    events,
                    generation,
                    wrap: Event::MomentsSnapshot,
                }),
            )
        });
        self.moments_loading = true;
    }

    fn install_users_listener(&mut self) {
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let live = self.deps.live.clone();
        let events = self.events_tx.clone();

        self.users_slot.install(move |generation| {
            let source = LiveSource::new("users", vec![Collection::Users], move || {
                let store = store.clone();
                async move { call_with_timeout("list_users", timeout, store.list_users()).await }
            });
            live.subscribe(
                source,
                Arc::new(EventSink {
                    events,
                    generation,
                    wrap: Event::UsersSnapshot,
                }),
            )
        });
    }

    fn install_messages_listener(&mut self, chat_id: String) {
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let live = self.deps.live.clone();
        let events = self.events_tx.clone();
        let watches = vec![Collection::Messages(chat_id.clone())];

        self.messages_slot.install(move |generation| {
            let source = LiveSource::new("messages", watches, move || {
                let store = store.clone();
                let chat_id = chat_id.clone();
                async move {
                    call_with_timeout("list_messages", timeout, store.list_messages(&chat_id)).await
                }
            });
            live.subscribe(
                source,
                Arc::new(EventSink {
                    events,
                    generation,
                    wrap: Event::MessagesSnapshot,
                }),
            )
        });
    }

    fn refresh_count(&mut self, reply: Option<Reply<u64>>) {
        let seq = self.counter.begin();
        if let Some(reply) = reply {
            self.count_waiters.insert(seq, reply);
        }

        let store = self.deps.store.clone();
        let range = self.pager.mode().range();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = call_with_timeout("count_moments", timeout, store.count_moments(range)).await;
            let _ = events.send(Event::CountLoaded(seq, result));
        });
    }

    /// Re-count every moment regardless of the current mode
    ///
    /// Feeds `stats.total_moments` while a search owns the aggregate counter.
    fn refresh_total(&mut self) {
        self.total_seq += 1;
        let seq = self.total_seq;
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = call_with_timeout("count_moments", timeout, store.count_moments(None)).await;
            let _ = events.send(Event::TotalLoaded(seq, result));
        });
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SearchInput(raw, reply) => {
                let result = self.ensure_active().map(|()| self.on_search_input(raw));
                let _ = reply.send(result);
            }
            Command::NextPage(reply) => {
                let result = self.ensure_active().map(|()| {
                    self.pager.next();
                    self.install_moments_listener();
                });
                let _ = reply.send(result);
            }
            Command::PreviousPage(reply) => {
                let result = self.ensure_active().map(|()| {
                    if self.pager.previous().is_some() {
                        self.install_moments_listener();
                    }
                });
                let _ = reply.send(result);
            }
            Command::RefreshCount(reply) => match self.ensure_active() {
                Ok(()) => self.refresh_count(Some(reply)),
                Err(error) => {
                    let _ = reply.send(Err(error));
                }
            },
            Command::DeleteMoment { id, reply } => self.delete_moment(id, reply),
            Command::BanUser { user_id, reply } => self.ban_user(user_id, reply),
            Command::OpenChat { target, reply } => self.open_chat(target, reply),
            Command::CloseChat(reply) => {
                self.messages_slot.cancel();
                self.chat = None;
                let _ = reply.send(Ok(()));
            }
            Command::SendMessage { text, reply } => self.send_message(text, reply),
            // Handled by the run loop
            Command::Shutdown => {}
        }
    }

    fn on_search_input(&mut self, raw: String) {
        self.search_input = raw.clone();
        let events = self.events_tx.clone();
        self.debouncer.on_input(raw, move |seq| {
            let _ = events.send(Event::SearchExpired(seq));
        });
    }

    fn delete_moment(&mut self, id: String, reply: Reply<MutationOutcome>) {
        if let Err(error) = self.ensure_active() {
            let _ = reply.send(Err(error));
            return;
        }
        if !self.deleting.insert(id.clone()) {
            let _ = reply.send(Ok(MutationOutcome::AlreadyInProgress));
            return;
        }

        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = call_with_timeout("delete_moment", timeout, store.delete_moment(&id)).await;
            let _ = events.send(Event::DeleteFinished { id, result, reply });
        });
    }

    fn ban_user(&mut self, user_id: String, reply: Reply<MutationOutcome>) {
        if let Err(error) = self.ensure_active() {
            let _ = reply.send(Err(error));
            return;
        }
        let user_id = user_id.trim().to_string();
        if user_id.is_empty() {
            let _ = reply.send(Err(AppError::Validation("user id is required".to_string())));
            return;
        }
        if !self.banning.insert(user_id.clone()) {
            let _ = reply.send(Ok(MutationOutcome::AlreadyInProgress));
            return;
        }

        let ban = self.deps.ban.clone();
        let caller = self.session.clone();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let request = BanRequest::for_user(user_id.clone());
            let result = call_with_timeout("ban_user", timeout, ban.ban_user(caller, request)).await;
            let _ = events.send(Event::BanFinished {
                user_id,
                result,
                reply,
            });
        });
    }

    fn open_chat(&mut self, target: String, reply: Reply<Chat>) {
        if let Err(error) = self.ensure_active() {
            let _ = reply.send(Err(error));
            return;
        }
        let Some(admin_uid) = self.session.as_ref().map(|s| s.uid.clone()) else {
            let _ = reply.send(Err(AppError::Unauthorized));
            return;
        };

        self.chat_seq += 1;
        let seq = self.chat_seq;
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = chat::open_or_create_chat(store, &admin_uid, &target, timeout).await;
            let _ = events.send(Event::ChatOpened {
                seq,
                target,
                result,
                reply,
            });
        });
    }

    fn send_message(&mut self, text: String, reply: Reply<ChatMessage>) {
        if let Err(error) = self.ensure_active() {
            let _ = reply.send(Err(error));
            return;
        }
        if let Err(error) = chat::validate_message(&text) {
            let _ = reply.send(Err(error));
            return;
        }
        let (Some(panel), Some(session)) = (&self.chat, &self.session) else {
            let _ = reply.send(Err(AppError::Validation("no chat is open".to_string())));
            return;
        };

        let message = NewChatMessage {
            chat_id: panel.chat.id.clone(),
            sender_id: session.uid.clone(),
            sender_email: session.email.clone(),
            text,
        };
        let store = self.deps.store.clone();
        let timeout = self.deps.config.backend_timeout();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = chat::send_message(store, message, timeout).await;
            let _ = events.send(Event::MessageSent { result, reply });
        });
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::MomentsSnapshot(generation, result) => {
                if !self.moments_slot.accept(generation) {
                    return;
                }
                self.moments_loading = false;
                match result {
                    Ok(moments) => {
                        self.pager.record_snapshot(&moments);
                        self.moments = moments;
                        self.moments_stale = false;
                        if self.status == ViewStatus::Loading {
                            self.status = ViewStatus::Ready;
                        }
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Error fetching moments");
                        // Terminal for this subscription
                        self.moments_slot.cancel();
                        self.moments_stale = true;
                        self.notices.error("Failed to fetch moments.");
                    }
                }
            }
            Event::UsersSnapshot(generation, result) => {
                if !self.users_slot.accept(generation) {
                    return;
                }
                match result {
                    Ok(users) => {
                        self.users = users;
                        self.users_stale = false;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Error fetching users");
                        self.users_slot.cancel();
                        self.users_stale = true;
                        self.notices.error("Failed to fetch users.");
                    }
                }
            }
            Event::MessagesSnapshot(generation, result) => {
                if !self.messages_slot.accept(generation) {
                    return;
                }
                let Some(panel) = self.chat.as_mut() else {
                    return;
                };
                match result {
                    Ok(messages) => {
                        panel.messages = messages;
                        panel.stale = false;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Error listening to chat messages");
                        self.messages_slot.cancel();
                        panel.stale = true;
                        self.notices.error("Failed to load chat messages.");
                    }
                }
            }
            Event::SearchExpired(seq) => {
                let Some(raw) = self.debouncer.take_expired(seq) else {
                    return;
                };
                if !self.is_active() {
                    return;
                }
                let mode = ViewMode::from_input(&raw);
                let mode_changed = &mode != self.pager.mode();
                self.pager.reset(mode);
                self.install_moments_listener();
                if mode_changed {
                    self.refresh_count(None);
                }
            }
            Event::CountLoaded(seq, result) => self.on_count_loaded(seq, result),
            Event::TotalLoaded(seq, result) => {
                if seq != self.total_seq {
                    return;
                }
                match result {
                    Ok(count) => self.total_moments = Some(count),
                    Err(error) => {
                        tracing::error!(error = %error, "Error fetching total moments count");
                        self.notices.error("Failed to fetch total moments count.");
                    }
                }
            }
            Event::DeleteFinished { id, result, reply } => {
                self.deleting.remove(&id);
                match result {
                    Ok(_) => {
                        record_mutation("delete_moment", "success");
                        tracing::info!(moment_id = %id, "Moment deleted");
                        self.moments.retain(|moment| moment.id != id);
                        self.notices.success("Moment deleted successfully!");
                        if self.is_active() {
                            self.refresh_count(None);
                            if self.pager.mode() != &ViewMode::Default {
                                self.refresh_total();
                            }
                        }
                        let _ = reply.send(Ok(MutationOutcome::Completed {
                            message: "Moment deleted successfully!".to_string(),
                        }));
                    }
                    Err(error) => {
                        record_mutation("delete_moment", "error");
                        tracing::error!(moment_id = %id, error = %error, "Error deleting moment");
                        self.notices.error("Failed to delete moment.");
                        let _ = reply.send(Err(error));
                    }
                }
            }
            Event::BanFinished {
                user_id,
                result,
                reply,
            } => {
                self.banning.remove(&user_id);
                match result {
                    Ok(response) if response.success => {
                        record_mutation("ban_user", "success");
                        self.notices.success(response.message.clone());
                        let _ = reply.send(Ok(MutationOutcome::Completed {
                            message: response.message,
                        }));
                    }
                    Ok(response) => {
                        record_mutation("ban_user", "error");
                        let message = if response.message.is_empty() {
                            "Failed to ban user.".to_string()
                        } else {
                            response.message
                        };
                        self.notices.error(message.clone());
                        let _ = reply.send(Err(AppError::callable(
                            crate::error::CallableCode::Internal,
                            message,
                        )));
                    }
                    Err(error) => {
                        record_mutation("ban_user", "error");
                        tracing::error!(user_id = %user_id, error = %error, "Error calling ban function");
                        self.notices.error(format!("Error banning user: {error}"));
                        let _ = reply.send(Err(error));
                    }
                }
            }
            Event::ChatOpened {
                seq,
                target,
                result,
                reply,
            } => match result {
                Ok(chat) => {
                    if seq == self.chat_seq && self.is_active() {
                        let chat_id = chat.id.clone();
                        self.chat = Some(ChatPanel {
                            chat: chat.clone(),
                            target_name: ChatPanel::resolve_target_name(&self.users, &target),
                            target_id: target,
                            messages: Vec::new(),
                            stale: false,
                        });
                        self.install_messages_listener(chat_id);
                    }
                    let _ = reply.send(Ok(chat));
                }
                Err(error) => {
                    tracing::error!(target_id = %target, error = %error, "Error opening chat");
                    self.notices.error("Failed to open chat.");
                    let _ = reply.send(Err(error));
                }
            },
            Event::MessageSent { result, reply } => {
                if let Err(error) = &result {
                    tracing::error!(error = %error, "Error sending message");
                    self.notices.error("Failed to send message.");
                }
                let _ = reply.send(result);
            }
        }
    }

    fn on_count_loaded(&mut self, seq: u64, result: Result<u64>) {
        let waiter = self.count_waiters.remove(&seq);
        match result {
            Ok(count) => {
                if self.counter.complete(seq, count) && self.pager.mode() == &ViewMode::Default {
                    self.total_moments = Some(count);
                }
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(count));
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "Error fetching total moments count");
                if self.counter.is_current(seq) {
                    self.notices.error("Failed to fetch total moments count.");
                }
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(error));
                }
            }
        }
    }

    // =========================================================================
    // View
    // =========================================================================

    fn publish(&self) {
        let moments = self
            .moments
            .iter()
            .map(|moment| MomentRow {
                busy: self.deleting.contains(&moment.id),
                moment: moment.clone(),
            })
            .collect();
        let users = self
            .users
            .iter()
            .map(|user| UserRow {
                is_admin: self.deps.admins.contains(&user.id),
                busy: self.banning.contains(&user.id),
                user: user.clone(),
            })
            .collect();

        let view = DashboardView {
            status: self.status,
            mode: self.pager.mode().clone(),
            search_input: self
                .debouncer
                .pending_input()
                .map(str::to_string)
                .unwrap_or_else(|| self.search_input.clone()),
            page: self.pager.page(),
            page_size: self.pager.page_size(),
            has_more: self.pager.has_more(),
            can_go_previous: self.pager.page() > 1,
            total_count: self.counter.value(),
            moments_loading: self.moments_loading,
            moments_stale: self.moments_stale,
            moments,
            users_stale: self.users_stale,
            users,
            stats: UserStats::compute(&self.users, self.total_moments, Utc::now()),
            chat: self.chat.as_ref().map(|panel| ChatPanel {
                // The users listener may resolve the name after the chat opened
                target_name: ChatPanel::resolve_target_name(&self.users, &panel.target_id),
                ..panel.clone()
            }),
            notices: self.notices.to_vec(),
        };
        self.view_tx.send_replace(view);
    }
}
