//! Toast registry, expiry timers, and snapshot fan-out.
//!
//! The broadcaster owns one ordered collection of live toasts and a set of
//! subscriber callbacks. Producers call [`ToastBroadcaster::emit`]; display
//! surfaces call [`ToastBroadcaster::subscribe`] on mount and
//! [`ToastBroadcaster::unsubscribe`] on unmount, receiving a full ordered
//! snapshot after every mutation. Each toast with a positive duration gets an
//! independent cancellable expiry task that routes through the same removal
//! path as a manual dismiss.

mod registry;
mod stats;
mod subscribers;
mod types;

pub use registry::{ToastBroadcaster, ToastHandle};
pub use stats::{BroadcasterStats, BroadcasterStatsSnapshot};
pub use subscribers::{SnapshotCallback, Subscription};
pub use types::{Toast, ToastId, ToastPayload, ToastVariant};
