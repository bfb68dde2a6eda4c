//! Remote sync collaborator surface.
//!
//! # Responsibility
//! - Define the pluggable service contract for the account-bound remote
//!   sync handshake.
//! - Provide the default background implementation used at startup.
//!
//! # Invariants
//! - The handshake is one-shot and fire-and-forget; its completion is
//!   invoked exactly once, on an execution context chosen by the service.
//! - Callers must not assume sync is active before the completion runs.

use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Remote-sync options carried on a resolved store descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSyncOptions {
    /// Identifier of the remote account-bound container.
    pub container_id: String,
}

impl RemoteSyncOptions {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
        }
    }
}

/// Outcome metadata reported by a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReport {
    pub container_id: String,
}

pub type SyncResult<T> = Result<T, SyncError>;

/// One-shot completion callback; receives the handshake outcome.
pub type HandshakeCompletion = Box<dyn FnOnce(SyncResult<HandshakeReport>) + Send + 'static>;

/// Remote sync handshake errors. Never fatal: provisioning logs the
/// failure and the process continues without active sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    InvalidContainerId(String),
    HandshakeFailed(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidContainerId(id) => {
                write!(f, "remote-sync container id is invalid: {id}")
            }
            Self::HandshakeFailed(message) => {
                write!(f, "remote-sync handshake failed: {message}")
            }
        }
    }
}

impl Error for SyncError {}

/// Service contract for the remote sync collaborator.
///
/// Selected by configuration (`SyncMode::RemoteSynced`), never by
/// specializing the container type.
pub trait RemoteSyncService: Send + Sync {
    /// Stable identifier used in log lines.
    fn service_id(&self) -> &str;

    /// Starts the background handshake for `options`.
    ///
    /// # Contract
    /// - Must not block the caller.
    /// - Must invoke `completion` exactly once.
    fn begin_handshake(&self, options: &RemoteSyncOptions, completion: HandshakeCompletion);
}

/// Default service: validates the container id and completes on a
/// background thread, standing in for the real account handshake.
#[derive(Debug, Default)]
pub struct DetachedRemoteSync;

impl RemoteSyncService for DetachedRemoteSync {
    fn service_id(&self) -> &str {
        "detached"
    }

    fn begin_handshake(&self, options: &RemoteSyncOptions, completion: HandshakeCompletion) {
        let options = options.clone();
        std::thread::spawn(move || {
            let container_id = options.container_id.trim().to_string();
            if container_id.is_empty() {
                completion(Err(SyncError::InvalidContainerId(options.container_id)));
                return;
            }
            info!(
                "event=sync_handshake module=sync status=ok service=detached container={}",
                container_id
            );
            completion(Ok(HandshakeReport { container_id }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{DetachedRemoteSync, RemoteSyncOptions, RemoteSyncService, SyncError};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn detached_service_completes_with_report() {
        let (tx, rx) = mpsc::channel();
        DetachedRemoteSync.begin_handshake(
            &RemoteSyncOptions::new("iCloud.example"),
            Box::new(move |outcome| {
                tx.send(outcome).expect("completion channel should accept");
            }),
        );

        let outcome = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("completion should run");
        let report = outcome.expect("handshake should succeed");
        assert_eq!(report.container_id, "iCloud.example");
    }

    #[test]
    fn detached_service_rejects_blank_container_id() {
        let (tx, rx) = mpsc::channel();
        DetachedRemoteSync.begin_handshake(
            &RemoteSyncOptions::new("   "),
            Box::new(move |outcome| {
                tx.send(outcome).expect("completion channel should accept");
            }),
        );

        let outcome = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("completion should run");
        assert!(matches!(outcome, Err(SyncError::InvalidContainerId(_))));
    }
}
