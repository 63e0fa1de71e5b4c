//! Prelude module for common re-exports.
//!
//! ```rust
//! use tomy_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, FrameConfig, RingBufferConfig, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{PROCESS_LOG_BUFFER_SIZE, RINGBUFFER_SIZE, SIGNAL_POLL_MS};
