//! Error types for the persistence core.

use std::path::PathBuf;

/// Errors the [`crate::sql::Sql`] handle and its collaborators can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation that requires an open connection was called before
    /// [`crate::sql::Sql::open`] or after [`crate::sql::Sql::close`].
    #[error("sqlite: not set up")]
    NotSetUp,

    /// `open()` was called on a handle that already has a live connection.
    #[error("sqlite: already open")]
    AlreadyOpen,

    /// The underlying engine build is not safe to share across threads
    /// (e.g. was not compiled with `SQLITE_THREADSAFE`).
    #[error("sqlite: engine build is not thread-safe")]
    ThreadUnsafeEngine,

    /// Opening the database file failed.
    #[error("sqlite: failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Opening failed for an I/O reason unrelated to the engine itself
    /// (missing parent directory, permissions, ...).
    #[error("io error opening {path}: {source}")]
    IoFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bootstrap DDL failed while creating the initial schema.
    #[error("failed to create schema: {0}")]
    SchemaCreationFailed(#[source] rusqlite::Error),

    /// A statement failed to prepare (bad SQL, missing table/column).
    #[error("failed to prepare statement: {0}")]
    QueryPreparationFailed(#[source] rusqlite::Error),

    /// A prepared statement failed to execute or step.
    #[error("failed to execute statement: {0}")]
    QueryExecutionFailed(#[source] rusqlite::Error),

    /// A caller-supplied parameter could not be bound (wrong arity, type
    /// mismatch against what the statement expects).
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// `commit`/`rollback` was called without a matching `begin`, or vice
    /// versa while a transaction was already open.
    #[error("transaction nesting mismatch")]
    TransactionMismatch,

    /// Catch-all for `rusqlite` errors not classified above.
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
