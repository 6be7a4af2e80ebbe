//! Error types for media-queue
//!
//! Three layers of errors:
//! - [`SubmitError`] — input rejected at submission time, never enqueued
//! - [`AdapterError`] — outcome of an external operation, classified as
//!   recoverable (consumes a retry) or non-recoverable (fails immediately)
//! - [`Error`] — top-level error for coordinator operations

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ConversionKind, Status, TaskId};

/// Result type alias for media-queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-queue
#[derive(Debug, Error)]
pub enum Error {
    /// Submission rejected before a task was created
    #[error("invalid submission: {0}")]
    Submit(#[from] SubmitError),

    /// Task not found in the table
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Operation not valid for the task's current state
    #[error("task {id} cannot be {operation} while {state:?}")]
    InvalidState {
        /// The task the operation was attempted on
        id: TaskId,
        /// The attempted operation ("paused", "resumed", "cancelled", "cleared")
        operation: &'static str,
        /// The task's status at the time
        state: Status,
    },

    /// Shutdown in progress — not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Submission-time input errors
///
/// These are surfaced synchronously to the caller; a rejected submission
/// never creates a task.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SubmitError {
    /// URL field was empty
    #[error("URL is empty")]
    EmptyUrl,

    /// URL failed to parse or uses an unsupported scheme
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// URL is well-formed but does not look like a single video link
    #[error("not a video URL: {0}")]
    NotVideoUrl(String),

    /// URL is well-formed but does not look like a playlist link
    #[error("not a playlist URL: {0}")]
    NotPlaylistUrl(String),

    /// Conversion input file has no extension to classify
    #[error("input file has no extension: {0}")]
    MissingExtension(PathBuf),

    /// Conversion input extension does not match the requested kind
    #[error("'{extension}' is not a supported {kind:?} input")]
    KindMismatch {
        /// The input file extension
        extension: String,
        /// The requested conversion kind
        kind: ConversionKind,
    },

    /// Target format is not valid for the requested kind
    #[error("unsupported target format '{target}' for {kind:?} conversion")]
    UnsupportedTarget {
        /// The requested target extension
        target: String,
        /// The requested conversion kind
        kind: ConversionKind,
    },

    /// Document conversion only produces PDF
    #[error("document conversion target must be 'pdf', got '{0}'")]
    DocumentTarget(String),
}

/// Error reported by an external operation adapter
///
/// The classification drives the download retry policy: non-recoverable
/// errors short-circuit remaining attempts, everything else consumes one
/// retry slot.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AdapterError {
    /// The source URL is not supported by the fetcher — never retried
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// The content is unavailable (removed, private, region-locked) — never retried
    #[error("Video unavailable: {0}")]
    Unavailable(String),

    /// Transient network failure
    #[error("network error: {0}")]
    Network(String),

    /// External tool failed (transcoder, image library, document converter)
    #[error("tool error: {0}")]
    Tool(String),

    /// Anything outside the defined contract
    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// Returns true if the error is transient and the operation may be retried
    ///
    /// Unsupported sources and unavailable content are permanent; retrying
    /// them would only burn attempts on the same answer.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AdapterError::UnsupportedUrl(_) | AdapterError::Unavailable(_) => false,
            AdapterError::Network(_) | AdapterError::Tool(_) | AdapterError::Other(_) => true,
        }
    }
}
