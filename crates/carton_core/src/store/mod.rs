//! Store provisioning.
//!
//! # Responsibility
//! - Merge the configured schema sources, derive the store descriptor,
//!   attach the store and hand back a ready root context.
//! - Keep the fatal/recoverable split: configuration-time failures
//!   terminate, attachment failures on durable stores are logged and the
//!   process continues.
//!
//! # Invariants
//! - `create` never returns an error value; its fatal class panics after
//!   logging, everything else is observable through logs only.
//! - In-memory attachment is synchronous; the returned context is usable
//!   immediately.
//! - Provisioning runs once at startup; there is no in-place retry.

use crate::config::{ConfigError, Placement, StoreConfig};
use crate::schema::{MergedSchema, SchemaError, SchemaRegistry};
use crate::sync::{DetachedRemoteSync, RemoteSyncOptions, RemoteSyncService};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod container;
pub mod descriptor;

pub use container::{Container, Context, ContextError};
pub use descriptor::{GroupContainerResolver, PlatformGroupResolver, StoreDescriptor, StoreKind};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Side table recording change deltas for downstream snapshot diffing.
const HISTORY_TRACKING_DDL: &str = "CREATE TABLE IF NOT EXISTS carton_change_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entity TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    change_kind TEXT NOT NULL CHECK (change_kind IN ('insert', 'update', 'delete')),
    recorded_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_carton_change_history_entity
    ON carton_change_history (entity, entity_id);";

/// Builds containers from configurations.
///
/// Collaborators (group resolver, remote sync service) are explicit
/// fields, never ambient singletons; tests swap them for fakes.
pub struct Provisioner {
    registry: SchemaRegistry,
    groups: Box<dyn GroupContainerResolver>,
    sync: Arc<dyn RemoteSyncService>,
}

impl Provisioner {
    /// Creates a provisioner with the platform group resolver and the
    /// default background sync service.
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            groups: Box::new(PlatformGroupResolver),
            sync: Arc::new(DetachedRemoteSync),
        }
    }

    pub fn with_group_resolver(mut self, groups: Box<dyn GroupContainerResolver>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_sync_service(mut self, sync: Arc<dyn RemoteSyncService>) -> Self {
        self.sync = sync;
        self
    }

    /// Provisions the store and returns the root context.
    ///
    /// Mirrors the startup contract: the fatal class (schema merge
    /// failure, unresolvable shared group, synchronous in-memory attach
    /// failure) logs and panics; durable attach failures are logged and
    /// the returned context stays detached.
    ///
    /// # Panics
    /// On the fatal error class described above.
    pub fn create(&self, config: StoreConfig) -> Context {
        match self.try_create(config) {
            Ok(container) => container.root_context(),
            Err(err) => {
                error!("event=store_provision module=store status=fatal error={err}");
                panic!("store provisioning failed: {err}");
            }
        }
    }

    /// Checked variant of [`create`](Self::create) for callers that want a
    /// post-creation health check instead of a process exit.
    ///
    /// # Errors
    /// Exactly the fatal class of `create`; recoverable attach failures
    /// still yield `Ok` with a detached root context.
    pub fn try_create(&self, config: StoreConfig) -> Result<Container, ProvisionError> {
        let started_at = Instant::now();
        let config = config.normalized();
        config.validate()?;

        info!(
            "event=store_provision module=store status=start store={} mode={}",
            config.store_name,
            placement_label(&config.placement)
        );

        let schema = self.registry.merge(&config.model_sources)?;
        let descriptor = StoreDescriptor::resolve(&config, self.groups.as_ref())?;
        let store = attach_store(&config.store_name, &schema, &descriptor)?;
        let root = Context::new(store);

        if let Some(options) = descriptor.remote_sync() {
            self.begin_remote_handshake(options);
        }

        info!(
            "event=store_provision module=store status=ok store={} session={} duration_ms={}",
            config.store_name,
            root.session_id(),
            started_at.elapsed().as_millis()
        );

        Ok(Container::new(schema, descriptor, root))
    }

    // Fire-and-forget: the handshake outcome is only ever logged here.
    fn begin_remote_handshake(&self, options: &RemoteSyncOptions) {
        let container_id = options.container_id.clone();
        info!(
            "event=sync_handshake module=store status=start service={} container={}",
            self.sync.service_id(),
            container_id
        );
        self.sync.begin_handshake(
            options,
            Box::new(move |outcome| match outcome {
                Ok(report) => info!(
                    "event=sync_handshake module=store status=ok container={}",
                    report.container_id
                ),
                Err(err) => error!(
                    "event=sync_handshake module=store status=error container={} error={}",
                    container_id, err
                ),
            }),
        );
    }
}

fn attach_store(
    store_name: &str,
    schema: &MergedSchema,
    descriptor: &StoreDescriptor,
) -> Result<Option<Connection>, ProvisionError> {
    let started_at = Instant::now();

    match (descriptor.kind(), descriptor.url()) {
        (StoreKind::InMemory, _) => {
            let conn = Connection::open_in_memory().map_err(ProvisionError::InMemoryAttach)?;
            bootstrap_store(&conn, schema, descriptor, false)
                .map_err(ProvisionError::InMemoryAttach)?;
            info!(
                "event=store_attach module=store status=ok mode=memory store={} history={} duration_ms={}",
                store_name,
                descriptor.history_tracking(),
                started_at.elapsed().as_millis()
            );
            Ok(Some(conn))
        }
        (StoreKind::Sqlite, Some(url)) => match attach_durable(url, schema, descriptor) {
            Ok(conn) => {
                info!(
                    "event=store_attach module=store status=ok mode=file store={} url={} history={} duration_ms={}",
                    store_name,
                    url.display(),
                    descriptor.history_tracking(),
                    started_at.elapsed().as_millis()
                );
                Ok(Some(conn))
            }
            Err(err) => {
                error!(
                    "event=store_attach module=store status=error mode=file store={} url={} duration_ms={} error={}",
                    store_name,
                    url.display(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Ok(None)
            }
        },
        (StoreKind::Sqlite, None) => {
            error!(
                "event=store_attach module=store status=error mode=file store={} error=missing_store_url",
                store_name
            );
            Ok(None)
        }
    }
}

fn attach_durable(
    url: &Path,
    schema: &MergedSchema,
    descriptor: &StoreDescriptor,
) -> Result<Connection, AttachError> {
    if let Some(parent) = url.parent() {
        std::fs::create_dir_all(parent).map_err(AttachError::Io)?;
    }
    let conn = Connection::open(url).map_err(AttachError::Sqlite)?;
    bootstrap_store(&conn, schema, descriptor, true).map_err(AttachError::Sqlite)?;
    Ok(conn)
}

fn bootstrap_store(
    conn: &Connection,
    schema: &MergedSchema,
    descriptor: &StoreDescriptor,
    durable: bool,
) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if durable {
        // WAL lets committed writes from other sessions on the same file
        // surface to this context without polling.
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.execute_batch(schema.ddl())?;
    if descriptor.history_tracking() {
        conn.execute_batch(HISTORY_TRACKING_DDL)?;
    }
    Ok(())
}

fn placement_label(placement: &Placement) -> &'static str {
    match placement {
        Placement::Local => "local",
        Placement::SharedGroup { .. } => "shared_group",
        Placement::InMemory => "memory",
    }
}

/// Fatal provisioning errors. Reported as `Err` by `try_create` and as a
/// panic by `create`; there is no partially-initialized container.
#[derive(Debug)]
pub enum ProvisionError {
    Config(ConfigError),
    Schema(SchemaError),
    UnresolvedGroupContainer(String),
    DataDirUnavailable,
    InMemoryAttach(rusqlite::Error),
}

impl Display for ProvisionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::UnresolvedGroupContainer(group_id) => {
                write!(f, "shared-group container could not be resolved: {group_id}")
            }
            Self::DataDirUnavailable => {
                write!(f, "no per-app data directory available for local placement")
            }
            Self::InMemoryAttach(err) => {
                write!(f, "synchronous in-memory attachment failed: {err}")
            }
        }
    }
}

impl Error for ProvisionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::InMemoryAttach(err) => Some(err),
            Self::UnresolvedGroupContainer(_) | Self::DataDirUnavailable => None,
        }
    }
}

impl From<ConfigError> for ProvisionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<SchemaError> for ProvisionError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

enum AttachError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
}

impl Display for AttachError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}
