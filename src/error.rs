//! Error types for the sample processing core
//!
//! Every stage of a pipeline returns [`Result`]. Failures raised by a
//! downstream consumer are wrapped exactly once into
//! [`ProcessorError::Broadcast`] so that the caller at the root of the
//! pipeline sees a single error that still carries the original cause.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Main error type for pipeline stages, aggregators and the external sorter
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A required collaborator (comparator, metadata, column) was never set
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A downstream consumer failed while a producer was broadcasting to it
    #[error("consumer '{consumer}' failed: {source}")]
    Broadcast {
        consumer: String,
        #[source]
        source: Box<ProcessorError>,
    },

    /// The sorter emitted a different number of samples than it consumed
    #[error("sort integrity failure: consumed {expected} samples but produced {actual}")]
    SortIntegrity { expected: u64, actual: u64 },

    /// A working directory or chunk file could not be created or opened
    #[error("resource error on {path:?}: {source}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A typed sample field could not be parsed
    #[error("invalid value {value:?} in column '{column}'")]
    InvalidSample { column: String, value: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunk file encoding errors
    #[error("chunk codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Delimited record file errors
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Report serialization errors
    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessorError {
    /// Build a configuration error from any displayable message
    pub fn configuration(message: impl Into<String>) -> Self {
        ProcessorError::Configuration(message.into())
    }

    /// Build a resource error for the given path
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProcessorError::Resource {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error raised by the named downstream consumer.
    ///
    /// Errors that are already broadcast failures pass through untouched so a
    /// deep pipeline does not nest one wrapper per stage.
    pub fn broadcast(consumer: &str, error: ProcessorError) -> Self {
        match error {
            already @ ProcessorError::Broadcast { .. } => already,
            other => ProcessorError::Broadcast {
                consumer: consumer.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Return the innermost error, skipping broadcast wrappers
    pub fn root_cause(&self) -> &ProcessorError {
        match self {
            ProcessorError::Broadcast { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
