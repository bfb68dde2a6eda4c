//! Container and root context.
//!
//! # Responsibility
//! - Own the merged schema, the resolved descriptor and exactly one
//!   long-lived root context.
//! - Give consumers a cloneable context handle without exposing the
//!   container as global state.
//!
//! # Invariants
//! - All clones of one context share the same underlying session; identity
//!   is observable through `Context::same_session`.
//! - After a non-fatal attach failure the context stays detached and every
//!   store operation fails with `ContextError::StoreNotAttached`.

use crate::schema::MergedSchema;
use crate::store::descriptor::StoreDescriptor;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Process-lifetime owner of one provisioned store.
///
/// Created once at startup and conventionally kept alive for the whole
/// process; callers that only need read/write access hold the root
/// `Context` instead.
#[derive(Debug)]
pub struct Container {
    schema: MergedSchema,
    descriptor: StoreDescriptor,
    root: Context,
}

impl Container {
    pub(crate) fn new(schema: MergedSchema, descriptor: StoreDescriptor, root: Context) -> Self {
        Self {
            schema,
            descriptor,
            root,
        }
    }

    pub fn schema(&self) -> &MergedSchema {
        &self.schema
    }

    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    pub fn history_tracking_enabled(&self) -> bool {
        self.descriptor.history_tracking()
    }

    /// Returns a handle to the root context. Cloning the handle never
    /// copies the session.
    pub fn root_context(&self) -> Context {
        self.root.clone()
    }
}

/// Live read/write session bound to a container.
///
/// Cheap to clone; all clones address the same session. Thread
/// confinement discipline belongs to the caller, matching the main-thread
/// affiliation convention of UI consumers.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    session_id: Uuid,
    store: Mutex<Option<Connection>>,
}

impl Context {
    pub(crate) fn new(store: Option<Connection>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                session_id: Uuid::new_v4(),
                store: Mutex::new(store),
            }),
        }
    }

    /// Stable id of the underlying session, used in log lines.
    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    /// True when both handles address the same session (reference
    /// identity, not value equality).
    pub fn same_session(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// False after a non-fatal attach failure.
    pub fn is_attached(&self) -> bool {
        self.lock_store().is_some()
    }

    /// Runs `f` against the attached store.
    ///
    /// # Errors
    /// - `StoreNotAttached` when attachment failed earlier.
    /// - `Sqlite` for engine errors raised by `f`.
    pub fn with_store<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, ContextError> {
        let guard = self.lock_store();
        let conn = guard.as_ref().ok_or(ContextError::StoreNotAttached)?;
        f(conn).map_err(ContextError::Sqlite)
    }

    /// Executes one or more SQL statements against the attached store.
    pub fn execute_batch(&self, sql: &str) -> Result<(), ContextError> {
        self.with_store(|conn| conn.execute_batch(sql))
    }

    /// Opens an explicit change set (a transaction on the session).
    pub fn begin_changes(&self) -> Result<(), ContextError> {
        self.execute_batch("BEGIN;")
    }

    /// Commits only when an explicit change set is open.
    ///
    /// Returns `true` when a commit happened, `false` when there was
    /// nothing to commit.
    pub fn commit_if_needed(&self) -> Result<bool, ContextError> {
        let guard = self.lock_store();
        let conn = guard.as_ref().ok_or(ContextError::StoreNotAttached)?;
        if conn.is_autocommit() {
            return Ok(false);
        }
        conn.execute_batch("COMMIT;").map_err(ContextError::Sqlite)?;
        Ok(true)
    }

    fn lock_store(&self) -> MutexGuard<'_, Option<Connection>> {
        match self.inner.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Errors raised by store operations through a context.
#[derive(Debug)]
pub enum ContextError {
    /// Attachment failed at startup; the container exists but its store
    /// never became usable.
    StoreNotAttached,
    Sqlite(rusqlite::Error),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreNotAttached => write!(f, "store is not attached"),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreNotAttached => None,
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for ContextError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, ContextError};
    use rusqlite::Connection;

    fn attached_context() -> Context {
        let conn = Connection::open_in_memory().expect("in-memory store should open");
        conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")
            .expect("table should create");
        Context::new(Some(conn))
    }

    #[test]
    fn clones_share_one_session() {
        let context = attached_context();
        let clone = context.clone();

        assert!(context.same_session(&clone));
        assert_eq!(context.session_id(), clone.session_id());

        clone
            .execute_batch("INSERT INTO notes (body) VALUES ('hello');")
            .expect("insert through clone should succeed");
        let count: i64 = context
            .with_store(|conn| conn.query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0)))
            .expect("count through original should succeed");
        assert_eq!(count, 1);
    }

    #[test]
    fn separately_created_contexts_are_distinct_sessions() {
        let first = attached_context();
        let second = attached_context();
        assert!(!first.same_session(&second));
    }

    #[test]
    fn detached_context_rejects_store_operations() {
        let context = Context::new(None);
        assert!(!context.is_attached());

        let err = context
            .execute_batch("SELECT 1;")
            .expect_err("detached context must fail");
        assert!(matches!(err, ContextError::StoreNotAttached));
    }

    #[test]
    fn commit_if_needed_commits_only_open_change_sets() {
        let context = attached_context();

        assert!(!context
            .commit_if_needed()
            .expect("no open change set should be a no-op"));

        context.begin_changes().expect("change set should open");
        context
            .execute_batch("INSERT INTO notes (body) VALUES ('pending');")
            .expect("insert should succeed");
        assert!(context
            .commit_if_needed()
            .expect("open change set should commit"));
        assert!(!context
            .commit_if_needed()
            .expect("second call should be a no-op"));

        let count: i64 = context
            .with_store(|conn| conn.query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0)))
            .expect("count should succeed");
        assert_eq!(count, 1);
    }
}
