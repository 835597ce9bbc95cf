//! Runtime configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default suffix of the wake event emitted on a cell's first write.
pub const DEFAULT_WAKE_SUFFIX: &str = "AWAKE";

/// Default name of the value-changed side-channel event.
pub const DEFAULT_CHANGE_EVENT: &str = "change";

/// Settings applied to cells created through a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// New cells suppress writes equal to their current value.
    pub dedup_by_default: bool,

    /// A panicking listener is logged and skipped instead of aborting the
    /// notification pass.
    pub isolate_listeners: bool,

    /// New cells emit a change event locally and on their realm.
    pub emit_change_events: bool,

    /// Suffix of the `"<id>:<suffix>"` wake event.
    pub wake_event_suffix: String,

    /// Name of the change event.
    pub change_event: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dedup_by_default: false,
            isolate_listeners: false,
            emit_change_events: false,
            wake_event_suffix: DEFAULT_WAKE_SUFFIX.to_string(),
            change_event: DEFAULT_CHANGE_EVENT.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.wake_event_suffix, "AWAKE");
        assert_eq!(config.change_event, "change");
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config =
            RuntimeConfig::from_json(r#"{"dedup_by_default": true, "change_event": "changed"}"#)
                .unwrap();
        assert!(config.dedup_by_default);
        assert!(!config.isolate_listeners);
        assert_eq!(config.change_event, "changed");
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = RuntimeConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = RuntimeConfig::default();
        config.isolate_listeners = true;
        let json = config.to_json().unwrap();
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }
}
