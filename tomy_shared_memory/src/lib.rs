//! # Tomy Shared Memory
//!
//! Synchronization and storage primitives shared between the threads of one
//! daemon process and between independent daemon processes.
//!
//! ## Components
//!
//! - [`Lock`]: mutual exclusion, either process-local or a robust
//!   process-shared pthread mutex inside a named segment
//! - [`CountingSignal`]: counting semaphore with blocking, timed and
//!   non-blocking waits, either process-local or a named POSIX semaphore
//! - [`RingBuffer`]: fixed-capacity circular byte store in a named segment,
//!   used to aggregate log records from many processes
//! - [`NamedSegment`]: the typed `/dev/shm` mapping the named variants sit on
//!
//! ## Ownership of named resources
//!
//! Every named resource has exactly one [`SegmentRole::Owner`] process. It
//! creates the resource (removing leftovers of a crashed predecessor),
//! initializes it and removes it on drop. All other processes open it with
//! [`SegmentRole::Attach`] and never tear it down.
//!
//! ```text
//! ┌──────────────┐  put   ┌──────────────────────────────┐  get   ┌──────────────┐
//! │ daemon A     ├───────►│ /dev/shm/tomy_<key>          ├───────►│ log monitor  │
//! │ (Attach)     │        │ [length|start|end|payload…]  │        │ (Owner)      │
//! └──────────────┘        └──────────────────────────────┘        └──────────────┘
//! ┌──────────────┐  put          ▲ guarded by
//! │ daemon B     ├───────────────┤ /dev/shm/tomy_<lock key> (pthread mutex)
//! │ (Attach)     │               │ and posted on /rbsemaphor
//! └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tomy_shared_memory::{RingBuffer, SegmentRole, ShmResult};
//! use std::path::Path;
//!
//! # fn main() -> ShmResult<()> {
//! let ring = RingBuffer::open(
//!     Path::new("/usr/local/etc/tomygateway/config/ringbuffer.key"),
//!     Path::new("/usr/local/etc/tomygateway/config/rbmutex.key"),
//!     SegmentRole::Attach,
//! )?;
//! ring.put(b"gateway started")?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lock;
pub mod platform;
pub mod ring;
pub mod segment;
pub mod signal;

pub use error::{ShmError, ShmResult};
pub use lock::{Lock, LockGuard};
pub use ring::{RingBuffer, RingHeader, RingSegment};
pub use segment::{NamedSegment, SegmentRole};
pub use signal::CountingSignal;
pub use tomy::config::LogLevel;
pub use tomy::consts::{PROCESS_LOG_BUFFER_SIZE, RINGBUFFER_SIZE};

/// Install a test-friendly subscriber at `level` (overridden by `RUST_LOG`).
///
/// Output goes through the test writer so it is captured per test, and
/// carries thread names, which identify workers. Safe to call repeatedly;
/// only the first call installs anything.
pub fn init_tracing(level: LogLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}
