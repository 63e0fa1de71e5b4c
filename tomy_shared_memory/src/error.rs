//! Error types for shared memory and named synchronization primitives

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while creating, attaching or using named resources
#[derive(Error, Debug)]
pub enum ShmError {
    /// Resource already exists and could not be replaced
    #[error("Named resource already exists: {name}")]
    AlreadyExists {
        /// Resource name
        name: String,
    },

    /// Resource not found (attach before the owner created it)
    #[error("Named resource not found: {name}")]
    NotFound {
        /// Resource name
        name: String,
    },

    /// Key file could not be turned into an IPC key
    #[error("Cannot derive IPC key from {}: {source}", path.display())]
    InvalidKey {
        /// Key file path
        path: PathBuf,
        /// Underlying OS error
        source: nix::Error,
    },

    /// Semaphore or segment name is malformed
    #[error("Invalid resource name: {name}")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Attached segment does not have the expected size
    #[error("Segment layout mismatch for {name}: expected {expected} bytes, found {found}")]
    LayoutMismatch {
        /// Segment name
        name: String,
        /// Expected size in bytes
        expected: usize,
        /// Actual size in bytes
        found: usize,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
