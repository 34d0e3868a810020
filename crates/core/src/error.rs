//! Error types for graphver operations.

use thiserror::Error;

/// Result type alias for graphver operations.
pub type Result<T> = std::result::Result<T, GraphverError>;

/// Main error type for graphver operations.
#[derive(Error, Debug)]
pub enum GraphverError {
    #[error("Git repository not found at path: {0}")]
    GitRepoNotFound(String),

    #[error("Invalid semantic version: {0}")]
    InvalidSemver(String),

    #[error("Invalid version file at {path}: {reason}")]
    InvalidVersionFile { path: String, reason: String },

    #[error("Invalid path filter: {0}")]
    InvalidPathFilter(String),

    #[error("Invalid commit id prefix: {0}")]
    InvalidCommitIdPrefix(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid commit id: {0}")]
    InvalidCommitId(String),

    #[error("\"inherit\": true in {0} but no parent version file was found")]
    MissingParentConfiguration(String),

    #[error("Shallow clone lacks the objects required to calculate the version height. Fetch history at least back to the last height-resetting change.")]
    ShallowClone,

    #[error("Version height {0} is outside the encodable range 0..=65534")]
    HeightOverflow(i64),

    #[error("{0} commits match the requested version")]
    AmbiguousVersionMatch(usize),

    #[error("Object {0} is missing from the repository")]
    MissingObject(String),

    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    #[error("Operation canceled")]
    Canceled,

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}
