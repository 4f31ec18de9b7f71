// Configuration
pub mod config;

// Domain layer (registry, timers, fan-out)
pub mod broadcaster;

pub use broadcaster::{
    BroadcasterStatsSnapshot, SnapshotCallback, Subscription, Toast, ToastBroadcaster,
    ToastHandle, ToastId, ToastPayload, ToastVariant,
};
pub use config::BroadcasterConfig;
