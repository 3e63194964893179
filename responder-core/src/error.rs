use thiserror::Error;

/// Persistence failures. These are fatal to the current loop invocation:
/// no status transition is persisted past a store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    /// Optimistic-concurrency violation: another writer appended a revision
    /// after this operation read the incident.
    #[error("revision conflict for incident {incident_id}: expected prior revision {expected:?}, found {found:?}")]
    Conflict {
        incident_id: String,
        expected: Option<i64>,
        found: Option<i64>,
    },
    #[error("corrupt incident record: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// The only errors that cross the orchestrator boundary. Collaborator
/// failures never appear here: they are absorbed into degraded defaults.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("incident not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure from an external collaborator (metrics, logs, knowledge base,
/// reasoning, notification, postmortem storage). Always recovered locally.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);
