use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use smallvec::SmallVec;
use tokio::task::JoinHandle;

use crate::config::BroadcasterConfig;

use super::stats::{BroadcasterStats, BroadcasterStatsSnapshot};
use super::subscribers::{SnapshotCallback, SubscriberSet, Subscription};
use super::types::{Toast, ToastId, ToastPayload};

/// Why a toast left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalCause {
    Manual,
    Expired,
}

/// Handle returned by [`ToastBroadcaster::emit`].
///
/// Exposes the assigned id and a dismiss shortcut bound to it, so a producer
/// can retire its own toast without holding a broadcaster reference.
pub struct ToastHandle {
    id: ToastId,
    broadcaster: Arc<ToastBroadcaster>,
}

impl ToastHandle {
    pub fn id(&self) -> &ToastId {
        &self.id
    }

    /// Dismiss the toast this handle was created for. Idempotent.
    pub fn dismiss(&self) {
        self.broadcaster.dismiss(&self.id);
    }
}

struct Inner {
    /// Live toasts in emit order
    toasts: Vec<Toast>,
    /// Subscriber callbacks in registration order
    subscribers: SubscriberSet,
    /// Pending expiry tasks keyed by toast id. An entry exists exactly while
    /// its toast is live and has a positive duration.
    timers: HashMap<ToastId, JoinHandle<()>>,
}

/// Process-wide registry of live toasts with timed expiry and snapshot fan-out.
///
/// Construct a single instance at application startup and share it by `Arc`;
/// any code holding the `Arc` may emit. A single mutex serializes all
/// mutations (`emit`, `dismiss`, timer firing, subscribe, unsubscribe), and is
/// never held while subscriber callbacks run, so callbacks may reentrantly
/// call any broadcaster operation.
pub struct ToastBroadcaster {
    inner: Mutex<Inner>,
    /// Monotonic sequence for id generation; ids are never reused
    seq: AtomicU64,
    stats: BroadcasterStats,
    config: BroadcasterConfig,
}

impl ToastBroadcaster {
    pub fn new() -> Self {
        Self::with_config(BroadcasterConfig::default())
    }

    pub fn with_config(config: BroadcasterConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                toasts: Vec::new(),
                subscribers: SubscriberSet::new(),
                timers: HashMap::new(),
            }),
            seq: AtomicU64::new(0),
            stats: BroadcasterStats::default(),
            config,
        }
    }

    /// Emit a toast and notify all current subscribers.
    ///
    /// Assigns a fresh id, appends the record to the end of the collection
    /// and, when the resolved duration is positive, schedules a cancellable
    /// expiry task for it. A payload without `duration_ms` gets the configured
    /// default; zero or negative disables expiry entirely.
    ///
    /// Must be called from within a Tokio runtime when the toast auto-expires,
    /// since the expiry timer is a spawned task.
    pub fn emit(self: &Arc<Self>, payload: ToastPayload) -> ToastHandle {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = ToastId::generate(now.timestamp_millis(), seq);
        let duration_ms = payload
            .duration_ms
            .unwrap_or(self.config.default_duration_ms as i64);

        let toast = Toast {
            id: id.clone(),
            title: payload.title,
            description: payload.description,
            variant: payload.variant,
            action: payload.action,
            duration_ms,
            open: true,
            emitted_at: now,
        };

        let (snapshot, subscribers, evicted) = {
            let mut inner = self.lock();
            inner.toasts.push(toast);

            // Optional cap: evict oldest toasts, cancelling their timers as
            // part of the same mutation
            let mut evicted = Vec::new();
            if let Some(max_live) = self.config.max_live {
                while inner.toasts.len() > max_live {
                    let old = inner.toasts.remove(0);
                    if let Some(timer) = inner.timers.remove(&old.id) {
                        timer.abort();
                    }
                    evicted.push(old.id);
                }
            }

            if duration_ms > 0 && inner.toasts.iter().any(|t| t.id == id) {
                let broadcaster = Arc::downgrade(self);
                let timer_id = id.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(duration_ms as u64)).await;
                    if let Some(broadcaster) = broadcaster.upgrade() {
                        broadcaster.remove(&timer_id, RemovalCause::Expired);
                    }
                });
                inner.timers.insert(id.clone(), timer);
            }

            (inner.toasts.clone(), inner.subscribers.frozen(), evicted)
        };

        self.stats.total_emitted.fetch_add(1, Ordering::Relaxed);
        for evicted_id in &evicted {
            self.stats.total_evicted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                toast_id = %evicted_id,
                live = snapshot.len(),
                "Evicted oldest toast over live cap"
            );
        }

        tracing::debug!(
            toast_id = %id,
            duration_ms = duration_ms,
            live = snapshot.len(),
            "Toast emitted"
        );

        self.deliver(&snapshot, subscribers);

        ToastHandle {
            id,
            broadcaster: Arc::clone(self),
        }
    }

    /// Dismiss a toast by id and notify all current subscribers.
    ///
    /// Idempotent: an id that is unknown, already dismissed, or already
    /// expired is a silent no-op. A live toast has its pending expiry timer
    /// cancelled before removal, so no expiry can fire for it afterwards.
    pub fn dismiss(&self, id: &ToastId) {
        self.remove(id, RemovalCause::Manual);
    }

    /// Register a snapshot callback and return its subscription handle.
    ///
    /// The callback receives the current snapshot immediately, then a fresh
    /// snapshot after every mutation until unsubscribed.
    pub fn subscribe(
        &self,
        callback: impl Fn(&[Toast]) + Send + Sync + 'static,
    ) -> Subscription {
        let callback: Arc<SnapshotCallback> = Arc::new(callback);
        let (subscription, snapshot) = {
            let mut inner = self.lock();
            let subscription = inner.subscribers.register(Arc::clone(&callback));
            (subscription, inner.toasts.clone())
        };

        tracing::debug!(subscription = %subscription, "Subscriber attached");

        // Initial snapshot so a mounting surface renders existing toasts
        self.invoke(subscription, &callback, &snapshot);
        subscription
    }

    /// Deregister a subscriber. Idempotent.
    ///
    /// After this returns the callback receives no further snapshots, even
    /// from a broadcast already in flight at the moment of detach.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let removed = self.lock().subscribers.remove(subscription);
        if removed {
            tracing::debug!(subscription = %subscription, "Subscriber detached");
        }
    }

    /// Current ordered snapshot of live toasts.
    pub fn snapshot(&self) -> Vec<Toast> {
        self.lock().toasts.clone()
    }

    /// Number of live toasts.
    pub fn len(&self) -> usize {
        self.lock().toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Get broadcaster statistics
    pub fn stats(&self) -> BroadcasterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared removal path for manual dismiss and timer expiry. Returns
    /// whether a toast was actually removed.
    fn remove(&self, id: &ToastId, cause: RemovalCause) -> bool {
        let (snapshot, subscribers) = {
            let mut inner = self.lock();
            let Some(position) = inner.toasts.iter().position(|t| &t.id == id) else {
                tracing::trace!(toast_id = %id, "Dismiss for unknown toast id, ignoring");
                return false;
            };
            inner.toasts.remove(position);
            if let Some(timer) = inner.timers.remove(id) {
                timer.abort();
            }
            (inner.toasts.clone(), inner.subscribers.frozen())
        };

        match cause {
            RemovalCause::Manual => self.stats.total_dismissed.fetch_add(1, Ordering::Relaxed),
            RemovalCause::Expired => self.stats.total_expired.fetch_add(1, Ordering::Relaxed),
        };

        tracing::debug!(
            toast_id = %id,
            cause = ?cause,
            live = snapshot.len(),
            "Toast removed"
        );

        self.deliver(&snapshot, subscribers);
        true
    }

    /// Fan a snapshot out to a frozen view of the subscriber set, in
    /// registration order. Liveness is re-checked per subscriber so one that
    /// was detached after the view was taken is skipped.
    fn deliver(
        &self,
        snapshot: &[Toast],
        subscribers: SmallVec<[(Subscription, Arc<SnapshotCallback>); 4]>,
    ) {
        for (subscription, callback) in subscribers {
            if !self.lock().subscribers.contains(subscription) {
                continue;
            }
            self.invoke(subscription, &callback, snapshot);
        }
    }

    /// Invoke one callback, containing panics so a misbehaving subscriber
    /// cannot abort delivery to the rest.
    fn invoke(&self, subscription: Subscription, callback: &Arc<SnapshotCallback>, snapshot: &[Toast]) {
        let callback = callback.as_ref();
        if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
            self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                subscription = %subscription,
                "Subscriber panicked while handling snapshot"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The lock is never held across subscriber callbacks, so a poisoned
        // mutex can only mean a panic between plain collection operations;
        // the data is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ToastBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ToastBroadcaster {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn collector() -> (Arc<StdMutex<Vec<Vec<Toast>>>>, impl Fn(&[Toast]) + Send + Sync + 'static) {
        let seen: Arc<StdMutex<Vec<Vec<Toast>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |toasts: &[Toast]| {
            sink.lock().unwrap().push(toasts.to_vec());
        })
    }

    fn sticky(title: &str) -> ToastPayload {
        ToastPayload::new().title(title).sticky()
    }

    #[tokio::test]
    async fn test_emit_assigns_unique_ids() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        let mut ids = Vec::new();
        for i in 0..100 {
            ids.push(broadcaster.emit(sticky(&format!("t{i}"))).id().clone());
        }

        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn test_snapshot_preserves_emit_order() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        broadcaster.emit(sticky("a"));
        broadcaster.emit(sticky("b"));
        broadcaster.emit(sticky("c"));

        let titles: Vec<_> = broadcaster
            .snapshot()
            .iter()
            .map(|t| t.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        let handle = broadcaster.emit(sticky("once"));

        let (seen, callback) = collector();
        broadcaster.subscribe(callback);

        broadcaster.dismiss(handle.id());
        broadcaster.dismiss(handle.id());

        let stats = broadcaster.stats();
        assert_eq!(stats.total_dismissed, 1);
        // Initial snapshot plus one removal broadcast; the second dismiss is
        // a no-op and must not notify anyone
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_dismiss_end_to_end() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        let (seen, callback) = collector();
        broadcaster.subscribe(callback);

        let handle = broadcaster.emit(ToastPayload::new().title("Saved").duration_ms(0));
        {
            let snapshots = seen.lock().unwrap();
            let latest = snapshots.last().unwrap();
            assert_eq!(latest.len(), 1);
            assert!(latest[0].open);
            assert!(latest[0].is_sticky());
        }

        handle.dismiss();
        assert!(seen.lock().unwrap().last().unwrap().is_empty());
        assert!(broadcaster.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_panic_does_not_block_others() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        broadcaster.subscribe(|_: &[Toast]| panic!("misbehaving surface"));
        let (seen, callback) = collector();
        broadcaster.subscribe(callback);

        broadcaster.emit(sticky("still delivered"));

        let snapshots = seen.lock().unwrap();
        assert_eq!(snapshots.last().unwrap().len(), 1);
        assert_eq!(broadcaster.stats().delivery_failures, 2);
    }

    #[tokio::test]
    async fn test_unsubscribed_callback_receives_nothing_further() {
        let broadcaster = Arc::new(ToastBroadcaster::new());
        let (seen, callback) = collector();
        let subscription = broadcaster.subscribe(callback);

        broadcaster.emit(sticky("before"));
        let count_before = seen.lock().unwrap().len();

        broadcaster.unsubscribe(subscription);
        broadcaster.unsubscribe(subscription);

        broadcaster.emit(sticky("after"));
        assert_eq!(seen.lock().unwrap().len(), count_before);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_self_unsubscribe_does_not_skip_others() {
        let broadcaster = Arc::new(ToastBroadcaster::new());

        let slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let self_slot = slot.clone();
        let reentrant = broadcaster.clone();
        let first = broadcaster.subscribe(move |_: &[Toast]| {
            if let Some(subscription) = self_slot.lock().unwrap().take() {
                reentrant.unsubscribe(subscription);
            }
        });
        *slot.lock().unwrap() = Some(first);

        let (seen, callback) = collector();
        broadcaster.subscribe(callback);

        broadcaster.emit(sticky("during detach"));

        assert_eq!(seen.lock().unwrap().last().unwrap().len(), 1);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_mid_broadcast_detach_skips_detached_subscriber() {
        let broadcaster = Arc::new(ToastBroadcaster::new());

        let (later_seen, later_callback) = collector();
        // First subscriber detaches the second during the broadcast; the
        // frozen view still lists the second, but liveness is re-checked
        let victim: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let victim_slot = victim.clone();
        let detacher = broadcaster.clone();
        broadcaster.subscribe(move |_: &[Toast]| {
            if let Some(subscription) = victim_slot.lock().unwrap().take() {
                detacher.unsubscribe(subscription);
            }
        });
        let second = broadcaster.subscribe(later_callback);
        *victim.lock().unwrap() = Some(second);
        let initial_deliveries = later_seen.lock().unwrap().len();

        broadcaster.emit(sticky("detached mid-flight"));

        assert_eq!(later_seen.lock().unwrap().len(), initial_deliveries);
    }

    #[tokio::test]
    async fn test_max_live_evicts_oldest() {
        let config = BroadcasterConfig {
            max_live: Some(2),
            ..Default::default()
        };
        let broadcaster = Arc::new(ToastBroadcaster::with_config(config));

        broadcaster.emit(sticky("a"));
        broadcaster.emit(sticky("b"));
        broadcaster.emit(sticky("c"));

        let titles: Vec<_> = broadcaster
            .snapshot()
            .iter()
            .map(|t| t.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert_eq!(broadcaster.stats().total_evicted, 1);
    }

    #[test]
    fn test_subscribe_delivers_initial_snapshot() {
        // Sticky toasts never spawn timers, so no runtime is needed
        tokio_test::block_on(async {
            let broadcaster = Arc::new(ToastBroadcaster::new());
            broadcaster.emit(sticky("already here"));

            let (seen, callback) = collector();
            broadcaster.subscribe(callback);

            let snapshots = seen.lock().unwrap();
            assert_eq!(snapshots.len(), 1);
            assert_eq!(snapshots[0].len(), 1);
        });
    }
}
