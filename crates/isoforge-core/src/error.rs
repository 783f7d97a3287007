//! Error types for the Isoforge core library
//!
//! Failures come in two tiers. [`Error`] is fatal: it ends the current
//! assembly and propagates to the caller after the destination has been
//! disposed. [`ItemFailure`] is recoverable: it describes one source item the
//! builder could not take, and assembly carries on with the next item.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Isoforge operations
#[derive(Error, Debug)]
pub enum Error {
    /// Boot image is missing or not a regular file
    #[error("Invalid boot file {path}: {reason}")]
    InvalidBootFile {
        /// Path that was given as the boot image
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Destination exists and overwriting was not requested
    #[error("Destination already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    /// Another process holds the destination open for writing
    #[error("Destination is in use by another process: {0}")]
    DestinationBusy(PathBuf),

    /// The image stream's read primitive reported a failure status
    #[error("Read failure (status {status}) after {blocks_written} blocks")]
    ReadFailure {
        /// Status code reported by the producer
        status: i32,
        /// Blocks successfully written before the failure
        blocks_written: u64,
    },

    /// Writing or flushing the destination failed
    #[error("Write failure after {blocks_written} blocks: {source}")]
    WriteFailure {
        /// Blocks successfully written before the failure
        blocks_written: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The external image builder failed outside of per-item ingestion
    #[error("Image builder error: {0}")]
    Builder(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was attempted in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error outside of the block copy
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Blocks written before the failure, for stream-level failures
    pub fn blocks_written(&self) -> Option<u64> {
        match self {
            Error::ReadFailure { blocks_written, .. } | Error::WriteFailure { blocks_written, .. } => {
                Some(*blocks_written)
            }
            _ => None,
        }
    }
}

/// Result type alias using the Isoforge error type
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable failure attached to a single source item
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    /// The source does not resolve to an existing file or directory
    #[error("Cannot resolve source {input}: {reason}")]
    SourceResolution {
        /// The input as given
        input: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// The builder refused to add the item to the image tree
    #[error("Failed to add {path} to the image: {reason} (try a different media type)")]
    TreeIngestion {
        /// Resolved path of the rejected item
        path: PathBuf,
        /// Reason given by the builder
        reason: String,
    },
}

impl ItemFailure {
    /// The source this failure refers to, as displayed to the user
    pub fn subject(&self) -> String {
        match self {
            ItemFailure::SourceResolution { input, .. } => input.clone(),
            ItemFailure::TreeIngestion { path, .. } => path.display().to_string(),
        }
    }
}
