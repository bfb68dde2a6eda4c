//! Store provisioning and context propagation for carton.
//!
//! Bootstraps a persistent (or in-memory) store from a small
//! configuration, hands back a ready root context, and propagates that
//! context to screen-like consumers through an explicit capability.

pub mod config;
pub mod logging;
pub mod propagate;
pub mod schema;
pub mod store;
pub mod sync;

pub use config::{ConfigError, Placement, StoreConfig, SyncMode};
pub use logging::{default_log_level, init_logging, logging_status};
pub use propagate::{inject, ContextHolder, Screen};
pub use schema::{MergedSchema, SchemaError, SchemaRegistry, SchemaSource};
pub use store::{
    Container, Context, ContextError, GroupContainerResolver, PlatformGroupResolver,
    ProvisionError, Provisioner, StoreDescriptor, StoreKind,
};
pub use sync::{
    DetachedRemoteSync, HandshakeCompletion, HandshakeReport, RemoteSyncOptions,
    RemoteSyncService, SyncError, SyncResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
