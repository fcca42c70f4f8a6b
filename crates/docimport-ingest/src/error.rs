//! Error types for the import pipeline
//!
//! Errors are split by blast radius:
//!
//! - [`ImportError`] aborts the whole run (sink connection, provider preparation)
//! - [`JobError`] is recorded in a file's [`PartialResult`](crate::result::PartialResult)
//! - [`LoadError`], [`HookError`] and [`SinkError`] are raised by the collaborators
//!   and wrapped into a [`JobError`] by the worker that observed them

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Fatal error: the run returns without a total result
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to connect to the document store: {0}")]
    Connection(#[source] SinkError),

    #[error("Failed to prepare datasource '{datasource}': {error}")]
    Prepare {
        datasource: String,
        #[source]
        error: ProviderError,
    },

    #[error("No enabled datasources to import")]
    NoSources,
}

/// Failure of a file provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Cannot walk {}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot access {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Pattern match failed: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Provider used before prepare()")]
    NotPrepared,
}

impl ProviderError {
    /// Filesystem path the error is about, when known
    pub fn path(&self) -> Option<&Path> {
        match self {
            ProviderError::NotADirectory(path) | ProviderError::Io { path, .. } => Some(path.as_path()),
            ProviderError::Walk(e) => e.path(),
            ProviderError::Glob(e) => Some(e.path()),
            ProviderError::Pattern { .. } | ProviderError::NotPrepared => None,
        }
    }
}

/// Failure of a record loader
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Invalid JSON on line {line}: {error}")]
    Json {
        line: u64,
        #[source]
        error: serde_json::Error,
    },

    #[error("Line {line} is not a JSON object")]
    NotAnObject { line: u64 },

    #[error("Line {line} has {found} fields, expected {expected}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Invalid delimiter '{0}': must be a single byte")]
    Delimiter(String),

    #[error("Header column contains a delimiter character: '{0}'. Specify the correct delimiter")]
    HeaderDelimiter(String),

    #[error("load() called before start()")]
    NotStarted,
}

/// Error returned by a post-load, pre-dump or update-filter hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(String);

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure reported by a sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Failed to encode record as BSON: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("Invalid connection settings: {0}")]
    Config(String),

    #[error("Write rejected by {database}.{collection}: {message}")]
    Rejected {
        database: String,
        collection: String,
        message: String,
    },
}

/// Failure recorded against a single file
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Failed to open {}: {error}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to start loader: {0}")]
    Start(#[source] LoadError),

    #[error("Failed to load record: {0}")]
    Load(#[source] LoadError),

    #[error("Hook rejected record: {0}")]
    Hook(#[from] HookError),

    #[error("Failed to write batch of {count} records: {error}")]
    Sink {
        count: usize,
        #[source]
        error: SinkError,
    },

    #[error("Missing database name")]
    MissingDatabase,

    #[error("Missing collection name")]
    MissingCollection,

    #[error("No loader configured")]
    MissingLoader,

    #[error("File provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Import task aborted: {0}")]
    Aborted(String),
}
