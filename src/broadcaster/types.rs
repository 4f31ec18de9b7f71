use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a toast at emit time.
///
/// Unique for the lifetime of the broadcaster that issued it and never reused,
/// even after the toast has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastId(String);

impl ToastId {
    /// Timestamp component plus a monotonic sequence number. The sequence
    /// alone guarantees uniqueness within one broadcaster.
    pub(crate) fn generate(timestamp_ms: i64, seq: u64) -> Self {
        Self(format!("{timestamp_ms}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual variant of a toast.
///
/// Display-only; the broadcaster never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Default,
    Destructive,
}

/// A live toast tracked by the broadcaster.
#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    /// Unique identifier assigned at emit time
    pub id: ToastId,
    /// Optional headline text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional body text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Visual variant
    pub variant: ToastVariant,
    /// Opaque action payload, passed through to display surfaces uninspected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<serde_json::Value>,
    /// Resolved auto-expiry interval in milliseconds; zero or negative means
    /// the toast is sticky and only a manual dismiss removes it
    pub duration_ms: i64,
    /// Whether the toast is currently displayable
    pub open: bool,
    /// When the toast was emitted
    pub emitted_at: DateTime<Utc>,
}

impl Toast {
    /// A sticky toast has no expiry timer and must be dismissed manually.
    pub fn is_sticky(&self) -> bool {
        self.duration_ms <= 0
    }
}

/// Payload for emitting a toast.
///
/// All fields are optional; missing ones fall back to broadcaster defaults.
/// `duration_ms` of zero or negative disables auto-expiry; omitting it selects
/// the configured default interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToastPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variant: ToastVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<serde_json::Value>,
}

impl ToastPayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the headline text
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the body text
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the visual variant
    pub fn variant(mut self, variant: ToastVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the auto-expiry interval in milliseconds
    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Disable auto-expiry; the toast stays until dismissed
    pub fn sticky(mut self) -> Self {
        self.duration_ms = Some(0);
        self
    }

    /// Attach an opaque action payload
    pub fn action(mut self, action: serde_json::Value) -> Self {
        self.action = Some(action);
        self
    }

    /// Attach an action payload from a serializable value
    pub fn action_from<T: Serialize>(mut self, action: &T) -> Result<Self, serde_json::Error> {
        self.action = Some(serde_json::to_value(action)?);
        Ok(self)
    }
}
