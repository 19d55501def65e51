//! Persistence layer — libSQL-backed storage for todos, memory, and profiles.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, SuspendedCallRecord, SuspendedStatus, ThreadInfo};

use std::sync::Arc;

/// Primary database plus an optional embedded replica of it.
///
/// An embedded replica forwards each write to the primary and applies it
/// locally before returning, so writes and default reads both go through it.
/// Forced reads skip it and ask the primary directly.
#[derive(Clone)]
pub struct Stores {
    primary: Arc<dyn Database>,
    replica: Option<Arc<dyn Database>>,
}

impl Stores {
    pub fn new(primary: Arc<dyn Database>) -> Self {
        Self {
            primary,
            replica: None,
        }
    }

    pub fn with_replica(mut self, replica: Arc<dyn Database>) -> Self {
        self.replica = Some(replica);
        self
    }

    pub fn writer(&self) -> &Arc<dyn Database> {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    pub fn reader(&self, force_primary: bool) -> &Arc<dyn Database> {
        if force_primary {
            &self.primary
        } else {
            self.writer()
        }
    }
}
