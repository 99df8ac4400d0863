//! Live query listeners
//!
//! A listener keeps a query's result fresh and pushes full snapshots to a
//! [`SnapshotSink`]. Two backends are provided:
//! - [`ChangeFeedListener`]: re-runs the query when the store publishes a
//!   relevant change
//! - [`PollingListener`]: re-runs the query on a fixed interval

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;

use super::store::RecordStore;
use crate::config::{DashboardConfig, LiveMode};
use crate::data::Collection;
use crate::error::{AppError, Result};

/// Receiver of listener output
///
/// `on_error` is terminal: the subscription delivers nothing afterwards.
pub trait SnapshotSink<T>: Send + Sync + 'static {
    fn on_snapshot(&self, items: Vec<T>);
    fn on_error(&self, error: AppError);
}

type Fetch<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// What a listener evaluates, and which collections invalidate it
pub struct LiveSource<T> {
    view: &'static str,
    watches: Vec<Collection>,
    fetch: Fetch<T>,
}

impl<T> LiveSource<T> {
    pub fn new<F, Fut>(view: &'static str, watches: Vec<Collection>, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        Self {
            view,
            watches,
            fetch: Arc::new(move || Box::pin(fetch())),
        }
    }

    pub fn view(&self) -> &'static str {
        self.view
    }

    fn is_relevant(&self, collection: &Collection) -> bool {
        self.watches.contains(collection)
    }
}

/// Handle to a running listener
///
/// Cancelling is synchronous and idempotent. Dropping the handle cancels.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Installs live queries
pub trait LiveQuery: Send + Sync {
    fn subscribe<T: Send + 'static>(
        &self,
        source: LiveSource<T>,
        sink: Arc<dyn SnapshotSink<T>>,
    ) -> Subscription;
}

/// Spawn `run` and return a subscription that stops it
///
/// The active flag is cleared before the task is aborted, so a fetch that
/// already completed never reaches the sink after cancellation.
fn spawn_listener<F, Fut>(run: F) -> Subscription
where
    F: FnOnce(Arc<AtomicBool>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let active = Arc::new(AtomicBool::new(true));
    let handle = tokio::spawn(run(active.clone()));
    Subscription::new(move || {
        active.store(false, Ordering::Release);
        handle.abort();
    })
}

/// Evaluate once and deliver. Returns `false` once the subscription is done.
async fn evaluate<T: 'static>(
    source: &LiveSource<T>,
    sink: &dyn SnapshotSink<T>,
    active: &AtomicBool,
) -> bool {
    let outcome = (source.fetch)().await;
    if !active.load(Ordering::Acquire) {
        return false;
    }
    match outcome {
        Ok(items) => {
            sink.on_snapshot(items);
            true
        }
        Err(error) => {
            tracing::warn!(view = source.view, error = %error, "Live query failed");
            sink.on_error(error);
            false
        }
    }
}

// =============================================================================
// Change feed
// =============================================================================

/// Re-runs the query whenever the store reports a relevant change
pub struct ChangeFeedListener {
    store: Arc<dyn RecordStore>,
}

impl ChangeFeedListener {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl LiveQuery for ChangeFeedListener {
    fn subscribe<T: Send + 'static>(
        &self,
        source: LiveSource<T>,
        sink: Arc<dyn SnapshotSink<T>>,
    ) -> Subscription {
        // Subscribe before the first fetch so no change slips in between.
        let mut changes = self.store.changes();

        spawn_listener(move |active| async move {
            loop {
                if !evaluate(&source, sink.as_ref(), &active).await {
                    return;
                }

                loop {
                    match changes.recv().await {
                        Ok(event) if source.is_relevant(&event.collection) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(view = source.view, skipped, "Change feed lagged, re-querying");
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        })
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Re-runs the query on a fixed interval
pub struct PollingListener {
    interval: Duration,
}

impl PollingListener {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl LiveQuery for PollingListener {
    fn subscribe<T: Send + 'static>(
        &self,
        source: LiveSource<T>,
        sink: Arc<dyn SnapshotSink<T>>,
    ) -> Subscription {
        let interval = self.interval;

        spawn_listener(move |active| async move {
            loop {
                if !evaluate(&source, sink.as_ref(), &active).await {
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

// =============================================================================
// Configured backend
// =============================================================================

/// Listener backend selected by `dashboard.live_mode`
pub enum LiveBackend {
    ChangeFeed(ChangeFeedListener),
    Polling(PollingListener),
}

impl LiveBackend {
    pub fn from_config(config: &DashboardConfig, store: Arc<dyn RecordStore>) -> Self {
        match config.live_mode {
            LiveMode::ChangeFeed => Self::ChangeFeed(ChangeFeedListener::new(store)),
            LiveMode::Polling => Self::Polling(PollingListener::new(config.poll_interval())),
        }
    }
}

impl LiveQuery for LiveBackend {
    fn subscribe<T: Send + 'static>(
        &self,
        source: LiveSource<T>,
        sink: Arc<dyn SnapshotSink<T>>,
    ) -> Subscription {
        match self {
            Self::ChangeFeed(listener) => listener.subscribe(source, sink),
            Self::Polling(listener) => listener.subscribe(source, sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::MockRecordStore;
    use crate::data::ChangeEvent;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{broadcast, mpsc};

    struct ChannelSink(mpsc::UnboundedSender<Result<Vec<u32>>>);

    impl SnapshotSink<u32> for ChannelSink {
        fn on_snapshot(&self, items: Vec<u32>) {
            let _ = self.0.send(Ok(items));
        }

        fn on_error(&self, error: AppError) {
            let _ = self.0.send(Err(error));
        }
    }

    fn counting_source(calls: Arc<AtomicUsize>, watches: Vec<Collection>) -> LiveSource<u32> {
        LiveSource::new("test", watches, move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(vec![n])
            }
        })
    }

    fn store_with_feed(feed: &broadcast::Sender<ChangeEvent>) -> Arc<dyn RecordStore> {
        let receiver = Mutex::new(Some(feed.subscribe()));
        let mut store = MockRecordStore::new();
        store
            .expect_changes()
            .returning(move || receiver.lock().unwrap().take().unwrap());
        Arc::new(store)
    }

    #[test]
    fn cancel_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();
        subscription.cancel();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn change_feed_requeries_on_relevant_changes_only() {
        let (feed, _) = broadcast::channel(16);
        let listener = ChangeFeedListener::new(store_with_feed(&feed));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));

        let _subscription = listener.subscribe(
            counting_source(calls.clone(), vec![Collection::Moments]),
            Arc::new(ChannelSink(tx)),
        );

        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![0]);

        feed.send(ChangeEvent::new(Collection::Users)).unwrap();
        feed.send(ChangeEvent::new(Collection::Moments)).unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_is_terminal() {
        let (feed, _) = broadcast::channel(16);
        let listener = ChangeFeedListener::new(store_with_feed(&feed));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = listener.subscribe(
            LiveSource::new("test", vec![Collection::Moments], || async {
                Err::<Vec<u32>, _>(AppError::Validation("boom".to_string()))
            }),
            Arc::new(ChannelSink(tx)),
        );

        assert!(matches!(rx.recv().await.unwrap(), Err(AppError::Validation(_))));
        // Sink is dropped with the finished task, closing the channel.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_after_cancel() {
        let listener = PollingListener::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut subscription =
            listener.subscribe(counting_source(calls.clone(), vec![]), Arc::new(ChannelSink(tx)));

        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![0]);
        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![1]);

        subscription.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(rx.try_recv().is_err());
    }
}
