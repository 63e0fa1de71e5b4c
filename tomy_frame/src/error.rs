//! Error types for thread and process lifecycle operations

use thiserror::Error;
use tomy::config::ConfigError;
use tomy_shared_memory::ShmError;

/// Errors raised by the framework itself (not by units of work).
#[derive(Error, Debug)]
pub enum FrameError {
    /// `start` called twice on one worker
    #[error("Thread {name} already started")]
    AlreadyStarted {
        /// Worker name
        name: String,
    },

    /// `join` called on a worker that never started
    #[error("Thread {name} was never started")]
    NotStarted {
        /// Worker name
        name: String,
    },

    /// The OS refused to create the thread
    #[error("Failed to spawn thread {name}: {source}")]
    Spawn {
        /// Worker name
        name: String,
        /// Source IO error
        source: std::io::Error,
    },

    /// `join` called a second time
    #[error("Thread {name} already joined")]
    AlreadyJoined {
        /// Worker name
        name: String,
    },

    /// The unit of work returned an error that is not a `Fault`
    #[error("Thread {name} aborted: {reason}")]
    Aborted {
        /// Worker name
        name: String,
        /// Rendered error
        reason: String,
    },

    /// The unit of work panicked
    #[error("Thread {name} panicked: {reason}")]
    Panicked {
        /// Worker name
        name: String,
        /// Panic payload, if it was a string
        reason: String,
    },

    /// The process already began its coordinated shutdown
    #[error("Process is shutting down")]
    ShuttingDown,

    /// Shared memory or named primitive failure
    #[error(transparent)]
    Shm(#[from] ShmError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for framework operations
pub type FrameResult<T> = Result<T, FrameError>;
