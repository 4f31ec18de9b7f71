use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use uuid::Uuid;

use super::types::Toast;

/// Callback invoked with the full ordered snapshot of live toasts after every
/// mutation. Each delivery fully replaces the previous one; surfaces must
/// tolerate the empty snapshot.
pub type SnapshotCallback = dyn Fn(&[Toast]) + Send + Sync;

/// Handle identifying a registered subscriber.
///
/// Returned by subscribe and passed back to unsubscribe. Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

impl Subscription {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscriber callbacks in registration order.
pub(crate) struct SubscriberSet {
    entries: Vec<(Subscription, Arc<SnapshotCallback>)>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn register(&mut self, callback: Arc<SnapshotCallback>) -> Subscription {
        let subscription = Subscription::new();
        self.entries.push((subscription, callback));
        subscription
    }

    /// Remove a subscriber. Returns false if the handle was not registered,
    /// which makes unsubscribe idempotent.
    pub(crate) fn remove(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != subscription);
        self.entries.len() != before
    }

    pub(crate) fn contains(&self, subscription: Subscription) -> bool {
        self.entries.iter().any(|(s, _)| *s == subscription)
    }

    /// Frozen view for fan-out. Broadcast iterates this copy, so a subscriber
    /// detaching itself or others reentrantly cannot invalidate the iteration.
    pub(crate) fn frozen(&self) -> SmallVec<[(Subscription, Arc<SnapshotCallback>); 4]> {
        self.entries
            .iter()
            .map(|(s, cb)| (*s, Arc::clone(cb)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
