//! Store provisioning configuration.
//!
//! # Responsibility
//! - Describe where a store lives, whether it is durable, and which
//!   optional features (remote sync, history tracking) are enabled.
//! - Normalize conflicting placement flags deterministically.
//!
//! # Invariants
//! - `Placement::InMemory` is mutually exclusive with
//!   `SyncMode::RemoteSynced`; normalization enforces this.
//! - In-memory placement always wins over a shared-group identifier, so
//!   test setups stay deterministic and network-free.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Where the backing store file lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Durable store in the default per-app data directory.
    Local,
    /// Durable store inside a shared application-group container.
    SharedGroup { group_id: String },
    /// Ephemeral store, attached synchronously, gone at process exit.
    InMemory,
}

/// Whether the store synchronizes with a remote account-bound service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    None,
    RemoteSynced { container_id: String },
}

/// Input to store provisioning. Built once at application startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Schema-bundle identifiers whose DDL is merged into one schema.
    pub model_sources: Vec<String>,
    /// Base name of the store file (without extension).
    pub store_name: String,
    pub placement: Placement,
    pub sync_mode: SyncMode,
    /// Records change deltas for later diffing by external consumers.
    pub history_tracking: bool,
}

impl StoreConfig {
    /// Creates a local, non-synced, non-tracking configuration.
    pub fn new(
        model_sources: impl IntoIterator<Item = impl Into<String>>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            model_sources: model_sources.into_iter().map(Into::into).collect(),
            store_name: store_name.into(),
            placement: Placement::Local,
            sync_mode: SyncMode::None,
            history_tracking: false,
        }
    }

    /// Builds a configuration from the flat startup flags and normalizes it.
    ///
    /// # Contract
    /// - `is_in_memory = true` discards both `application_group_identifier`
    ///   and `remote_sync_container_identifier`.
    /// - A group identifier without in-memory placement selects
    ///   `Placement::SharedGroup`.
    pub fn from_flags(
        model_sources: impl IntoIterator<Item = impl Into<String>>,
        store_name: impl Into<String>,
        application_group_identifier: Option<String>,
        remote_sync_container_identifier: Option<String>,
        is_in_memory: bool,
        history_tracking: bool,
    ) -> Self {
        let placement = if is_in_memory {
            Placement::InMemory
        } else if let Some(group_id) = application_group_identifier {
            Placement::SharedGroup { group_id }
        } else {
            Placement::Local
        };
        let sync_mode = match remote_sync_container_identifier {
            Some(container_id) if !is_in_memory => SyncMode::RemoteSynced { container_id },
            _ => SyncMode::None,
        };

        Self {
            model_sources: model_sources.into_iter().map(Into::into).collect(),
            store_name: store_name.into(),
            placement,
            sync_mode,
            history_tracking,
        }
    }

    /// Returns the configuration with conflicting flags resolved.
    ///
    /// In-memory placement drops any remote-sync selection; other
    /// combinations pass through unchanged.
    pub fn normalized(mut self) -> Self {
        if self.placement == Placement::InMemory {
            self.sync_mode = SyncMode::None;
        }
        self
    }

    /// Validates field-level constraints before provisioning starts.
    ///
    /// # Errors
    /// - Blank store name.
    /// - Blank shared-group or remote-container identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.trim().is_empty() {
            return Err(ConfigError::BlankStoreName);
        }
        if let Placement::SharedGroup { group_id } = &self.placement {
            if group_id.trim().is_empty() {
                return Err(ConfigError::BlankGroupIdentifier);
            }
        }
        if let SyncMode::RemoteSynced { container_id } = &self.sync_mode {
            if container_id.trim().is_empty() {
                return Err(ConfigError::BlankSyncContainerIdentifier);
            }
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.placement == Placement::InMemory
    }
}

/// Field-level configuration errors. All of these are fatal at provisioning
/// time; there is no sensible running state without a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BlankStoreName,
    BlankGroupIdentifier,
    BlankSyncContainerIdentifier,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankStoreName => write!(f, "store name must not be blank"),
            Self::BlankGroupIdentifier => {
                write!(f, "shared-group identifier must not be blank")
            }
            Self::BlankSyncContainerIdentifier => {
                write!(f, "remote-sync container identifier must not be blank")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Placement, StoreConfig, SyncMode};

    #[test]
    fn from_flags_selects_local_placement_by_default() {
        let config = StoreConfig::from_flags(["contacts"], "Main", None, None, false, false);
        assert_eq!(config.placement, Placement::Local);
        assert_eq!(config.sync_mode, SyncMode::None);
        assert!(!config.history_tracking);
    }

    #[test]
    fn from_flags_selects_shared_group_when_identifier_present() {
        let config = StoreConfig::from_flags(
            ["contacts"],
            "Main",
            Some("group.example.shared".to_string()),
            None,
            false,
            true,
        );
        assert_eq!(
            config.placement,
            Placement::SharedGroup {
                group_id: "group.example.shared".to_string()
            }
        );
        assert!(config.history_tracking);
    }

    #[test]
    fn in_memory_wins_over_group_and_sync_identifiers() {
        let config = StoreConfig::from_flags(
            ["contacts"],
            "Main",
            Some("group.example.shared".to_string()),
            Some("iCloud.example".to_string()),
            true,
            false,
        );
        assert_eq!(config.placement, Placement::InMemory);
        assert_eq!(config.sync_mode, SyncMode::None);
    }

    #[test]
    fn normalized_drops_remote_sync_for_in_memory_placement() {
        let config = StoreConfig {
            model_sources: vec!["contacts".to_string()],
            store_name: "Main".to_string(),
            placement: Placement::InMemory,
            sync_mode: SyncMode::RemoteSynced {
                container_id: "iCloud.example".to_string(),
            },
            history_tracking: false,
        }
        .normalized();
        assert_eq!(config.sync_mode, SyncMode::None);
    }

    #[test]
    fn validate_rejects_blank_identifiers() {
        let mut config = StoreConfig::new(["contacts"], "   ");
        assert_eq!(config.validate(), Err(ConfigError::BlankStoreName));

        config.store_name = "Main".to_string();
        config.placement = Placement::SharedGroup {
            group_id: " ".to_string(),
        };
        assert_eq!(config.validate(), Err(ConfigError::BlankGroupIdentifier));

        config.placement = Placement::Local;
        config.sync_mode = SyncMode::RemoteSynced {
            container_id: "".to_string(),
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BlankSyncContainerIdentifier)
        );

        config.sync_mode = SyncMode::None;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = StoreConfig::from_flags(
            ["contacts", "calendar"],
            "Main",
            None,
            Some("iCloud.example".to_string()),
            false,
            true,
        );
        let json = serde_json::to_string(&config).expect("config should serialize");
        let back: StoreConfig = serde_json::from_str(&json).expect("config should deserialize");
        assert_eq!(back, config);
    }
}
