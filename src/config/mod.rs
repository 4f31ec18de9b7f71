use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`crate::ToastBroadcaster`].
///
/// The broadcaster owns no environment or file surface; embed this in the
/// application's own settings and pass it to `with_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Auto-expiry interval in milliseconds applied when a payload does not
    /// specify one
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,
    /// Cap on concurrently live toasts; when exceeded the oldest is evicted.
    /// `None` means unbounded
    #[serde(default)]
    pub max_live: Option<usize>,
}

fn default_duration_ms() -> u64 {
    5000 // 5 seconds
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
            max_live: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BroadcasterConfig::default();
        assert_eq!(config.default_duration_ms, 5000);
        assert_eq!(config.max_live, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: BroadcasterConfig = serde_json::from_str(r#"{"max_live": 3}"#).unwrap();
        assert_eq!(config.default_duration_ms, 5000);
        assert_eq!(config.max_live, Some(3));
    }
}
