//! Resolved store placement and options.
//!
//! # Responsibility
//! - Derive one immutable `StoreDescriptor` from a `StoreConfig`.
//! - Resolve shared-group identifiers to directories through a
//!   collaborator, never by reading ambient global state.
//!
//! # Invariants
//! - Resolution is deterministic for a given configuration and resolver.
//! - A descriptor is never mutated after creation.
//! - In-memory descriptors have no url and are attached synchronously.

use crate::config::{Placement, StoreConfig, SyncMode};
use crate::store::ProvisionError;
use crate::sync::RemoteSyncOptions;
use std::path::{Path, PathBuf};

const STORE_FILE_EXTENSION: &str = "sqlite3";

/// Physical kind of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Durable SQLite file on disk.
    Sqlite,
    /// Ephemeral store living only in process memory.
    InMemory,
}

/// Resolved placement and options for one store. Derived once from the
/// configuration; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDescriptor {
    url: Option<PathBuf>,
    kind: StoreKind,
    add_synchronously: bool,
    history_tracking: bool,
    remote_sync: Option<RemoteSyncOptions>,
}

impl StoreDescriptor {
    /// Derives the descriptor for `config`.
    ///
    /// # Errors
    /// - `UnresolvedGroupContainer` when a shared-group id cannot be mapped
    ///   to an existing directory.
    /// - `DataDirUnavailable` when the platform has no per-app data
    ///   directory for local placement.
    pub fn resolve(
        config: &StoreConfig,
        groups: &dyn GroupContainerResolver,
    ) -> Result<Self, ProvisionError> {
        let store_file = format!("{}.{STORE_FILE_EXTENSION}", config.store_name.trim());

        let (url, kind, add_synchronously) = match &config.placement {
            Placement::InMemory => (None, StoreKind::InMemory, true),
            Placement::Local => {
                let dir = default_store_dir().ok_or(ProvisionError::DataDirUnavailable)?;
                (Some(dir.join(store_file)), StoreKind::Sqlite, false)
            }
            Placement::SharedGroup { group_id } => {
                let dir = groups.container_dir(group_id).ok_or_else(|| {
                    ProvisionError::UnresolvedGroupContainer(group_id.clone())
                })?;
                (Some(dir.join(store_file)), StoreKind::Sqlite, false)
            }
        };

        let remote_sync = match &config.sync_mode {
            SyncMode::RemoteSynced { container_id } => {
                Some(RemoteSyncOptions::new(container_id.clone()))
            }
            SyncMode::None => None,
        };

        Ok(Self {
            url,
            kind,
            add_synchronously,
            history_tracking: config.history_tracking,
            remote_sync,
        })
    }

    /// Store file path; `None` for in-memory stores.
    pub fn url(&self) -> Option<&Path> {
        self.url.as_deref()
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Whether attachment must finish before provisioning returns.
    pub fn add_synchronously(&self) -> bool {
        self.add_synchronously
    }

    pub fn history_tracking(&self) -> bool {
        self.history_tracking
    }

    pub fn remote_sync(&self) -> Option<&RemoteSyncOptions> {
        self.remote_sync.as_ref()
    }
}

/// Maps an application-group identifier to its container directory.
///
/// Implemented by the platform layer; provisioning only consumes the
/// result. Returning `None` means the group is not resolvable, which is
/// fatal for `Placement::SharedGroup`.
pub trait GroupContainerResolver {
    fn container_dir(&self, group_id: &str) -> Option<PathBuf>;
}

/// Default resolver: `<per-user data dir>/carton-groups/<group_id>`,
/// required to exist on disk at provisioning time.
#[derive(Debug, Default)]
pub struct PlatformGroupResolver;

impl GroupContainerResolver for PlatformGroupResolver {
    fn container_dir(&self, group_id: &str) -> Option<PathBuf> {
        let dir = dirs::data_dir()?.join("carton-groups").join(group_id.trim());
        dir.is_dir().then_some(dir)
    }
}

fn default_store_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("carton"))
}

#[cfg(test)]
mod tests {
    use super::{GroupContainerResolver, StoreDescriptor, StoreKind};
    use crate::config::{Placement, StoreConfig, SyncMode};
    use crate::store::ProvisionError;
    use std::path::PathBuf;

    struct FixedGroupResolver {
        dir: PathBuf,
    }

    impl GroupContainerResolver for FixedGroupResolver {
        fn container_dir(&self, _group_id: &str) -> Option<PathBuf> {
            Some(self.dir.clone())
        }
    }

    struct NoGroupResolver;

    impl GroupContainerResolver for NoGroupResolver {
        fn container_dir(&self, _group_id: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn in_memory_descriptor_has_no_url_and_attaches_synchronously() {
        let mut config = StoreConfig::new(["contacts"], "Test");
        config.placement = Placement::InMemory;

        let descriptor =
            StoreDescriptor::resolve(&config, &NoGroupResolver).expect("resolve should succeed");
        assert_eq!(descriptor.kind(), StoreKind::InMemory);
        assert!(descriptor.url().is_none());
        assert!(descriptor.add_synchronously());
    }

    #[test]
    fn local_descriptor_targets_the_per_app_data_dir() {
        let config = StoreConfig::new(["contacts"], "Main");

        match StoreDescriptor::resolve(&config, &NoGroupResolver) {
            Ok(descriptor) => {
                assert_eq!(descriptor.kind(), StoreKind::Sqlite);
                assert!(!descriptor.add_synchronously());
                let url = descriptor.url().expect("local store should have a url");
                assert!(url.ends_with("carton/Main.sqlite3"));
            }
            // Hosts without a per-user data directory report the fatal
            // error instead of inventing a path.
            Err(err) => assert!(matches!(err, ProvisionError::DataDirUnavailable)),
        }
    }

    #[test]
    fn shared_group_descriptor_places_file_in_group_dir() {
        let mut config = StoreConfig::new(["contacts"], "Shared");
        config.placement = Placement::SharedGroup {
            group_id: "group.example".to_string(),
        };
        config.history_tracking = true;

        let resolver = FixedGroupResolver {
            dir: PathBuf::from("/tmp/group.example"),
        };
        let descriptor =
            StoreDescriptor::resolve(&config, &resolver).expect("resolve should succeed");
        assert_eq!(descriptor.kind(), StoreKind::Sqlite);
        assert_eq!(
            descriptor.url(),
            Some(PathBuf::from("/tmp/group.example/Shared.sqlite3").as_path())
        );
        assert!(!descriptor.add_synchronously());
        assert!(descriptor.history_tracking());
    }

    #[test]
    fn unresolvable_group_is_an_error() {
        let mut config = StoreConfig::new(["contacts"], "Shared");
        config.placement = Placement::SharedGroup {
            group_id: "group.nonexistent".to_string(),
        };

        let err = StoreDescriptor::resolve(&config, &NoGroupResolver)
            .expect_err("unresolvable group must fail");
        assert!(matches!(err, ProvisionError::UnresolvedGroupContainer(id) if id == "group.nonexistent"));
    }

    #[test]
    fn remote_sync_options_carry_container_id() {
        let mut config = StoreConfig::new(["contacts"], "Synced");
        config.sync_mode = SyncMode::RemoteSynced {
            container_id: "iCloud.example".to_string(),
        };

        let resolver = FixedGroupResolver {
            dir: PathBuf::from("/tmp/unused"),
        };
        let descriptor =
            StoreDescriptor::resolve(&config, &resolver).expect("resolve should succeed");
        let sync = descriptor.remote_sync().expect("sync options expected");
        assert_eq!(sync.container_id, "iCloud.example");
    }
}
