//! # Tomy Frame
//!
//! Runtime framework for long-running daemon processes made of cooperating
//! worker threads.
//!
//! - [`ProcessContext`]: parameters plus the log channel into the shared
//!   ring buffer
//! - [`MultiThreadedProcessContext`]: owns the workers and drives an orderly
//!   shutdown when a stop is requested
//! - [`WorkerThread`] / [`Runnable`]: one OS thread per unit of work, with a
//!   fault boundary around it
//! - [`Fault`]: severity-classified error; `Fatal` stops the process
//! - [`EventQueue`]: blocking FIFO for messages between workers
//! - [`Timer`]: elapsed time and deadline checks for polling loops
//!
//! ## Example
//!
//! ```rust,no_run
//! use tomy::config::FrameConfig;
//! use tomy_frame::{
//!     MultiThreadedProcessContext, ProcessArgs, ProcessContext, RunResult, SegmentRole,
//!     WorkerContext, install_signal_handlers, log_write,
//! };
//!
//! fn poll_broker(ctx: &WorkerContext) -> RunResult {
//!     while !ctx.is_stopping() {
//!         log_write!(ctx.process(), "{} alive", ctx.thread_name())?;
//!         std::thread::sleep(std::time::Duration::from_secs(1));
//!     }
//!     Ok(())
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! install_signal_handlers()?;
//! let args = ProcessArgs::from_env(FrameConfig::new("gateway"));
//! let app = MultiThreadedProcessContext::new(ProcessContext::new(args, SegmentRole::Attach)?);
//! app.attach("broker", poll_broker)?;
//! app.run();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod event_queue;
pub mod fault;
pub mod multi;
pub mod os_signal;
pub mod params;
pub mod thread;
pub mod timer;

pub use context::{LogRecord, ProcessContext};
pub use error::{FrameError, FrameResult};
pub use event_queue::{EventQueue, TimeoutEvent};
pub use fault::{Fault, Origin, Severity};
pub use multi::MultiThreadedProcessContext;
pub use os_signal::{check_signal, install_signal_handlers};
pub use params::{ParamSource, ProcessArgs};
pub use thread::{RunResult, Runnable, StopEvent, ThreadExit, WorkerContext, WorkerThread};
pub use timer::Timer;
pub use tomy_shared_memory::SegmentRole;
