//! things2reclaim - Keep a Things to-do list, Reclaim tasks and Toggl time
//! entries in sync.
//!
//! This library provides the core functionality for the `t2r` CLI tool:
//! mirroring to-dos as scheduled tasks, sweeping finished or deleted
//! tasks through a local upload ledger, and reconciling tracked time with
//! scheduled work events.

pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod reconcile;
pub mod storage;

pub use providers::ProviderError;


/// Library-level error type for things2reclaim operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A required tag is absent from a to-do.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A tag value could not be parsed.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Several candidates matched and none was chosen.
    #[error("Ambiguous match: {0}")]
    AmbiguousMatch(String),

    #[error("Already in upload ledger: {0}")]
    DuplicateLedgerEntry(String),

    /// Not every task is scheduled, so date-based summaries are partial.
    #[error("Incomplete date information: {0}")]
    IncompleteDateInfo(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for things2reclaim operations.
pub type Result<T> = std::result::Result<T, Error>;
