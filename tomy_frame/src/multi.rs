//! Process context owning a set of worker threads and their shutdown

use crate::context::ProcessContext;
use crate::error::{FrameError, FrameResult};
use crate::os_signal;
use crate::thread::{Runnable, StopEvent, ThreadExit, WorkerThread};
use parking_lot::Mutex;
use std::sync::Arc;
use tomy::consts::SIGNAL_POLL_MS;

struct Registry {
    threads: Vec<WorkerThread>,
    closed: bool,
}

/// A [`ProcessContext`] plus the worker threads attached to it.
///
/// The owning thread calls [`run`](Self::run), which blocks until a stop
/// is requested (by [`stop`](Self::stop), by a worker's fatal fault, or by
/// SIGINT/SIGTERM) and then joins every attached worker in attachment order.
pub struct MultiThreadedProcessContext {
    process: Arc<ProcessContext>,
    stop: Arc<StopEvent>,
    registry: Mutex<Registry>,
}

impl MultiThreadedProcessContext {
    /// Wrap a process context; no workers yet.
    pub fn new(process: ProcessContext) -> Self {
        Self {
            process: Arc::new(process),
            stop: Arc::new(StopEvent::new()),
            registry: Mutex::new(Registry {
                threads: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Create, initialize and start a worker for `unit`.
    pub fn attach(&self, name: impl Into<String>, unit: impl Runnable) -> FrameResult<()> {
        self.attach_thread(WorkerThread::new(name, unit))
    }

    /// Initialize and start a prepared worker and register it.
    ///
    /// Refused with [`FrameError::ShuttingDown`] once `run` has started
    /// joining.
    pub fn attach_thread(&self, mut thread: WorkerThread) -> FrameResult<()> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(FrameError::ShuttingDown);
        }

        thread.initialize(self.process.params());
        thread.start(Arc::clone(&self.process), Arc::clone(&self.stop))?;
        tracing::info!(
            thread = thread.name(),
            count = registry.threads.len() + 1,
            "Worker attached"
        );
        registry.threads.push(thread);
        Ok(())
    }

    /// Block until a stop is requested, then join all workers.
    ///
    /// Returns the number of workers joined. Workers that ended abnormally
    /// are logged and still counted.
    pub fn run(&self) -> usize {
        tracing::info!("Waiting for stop request");
        loop {
            if self.stop.signal().timed_wait(SIGNAL_POLL_MS) {
                tracing::info!("Stop requested");
                break;
            }
            if let Some(signal) = os_signal::termination_requested() {
                tracing::info!(%signal, "Termination signal received");
                break;
            }
        }
        self.stop.mark_stopping();

        let threads = {
            let mut registry = self.registry.lock();
            registry.closed = true;
            std::mem::take(&mut registry.threads)
        };

        let mut joined = 0;
        for mut thread in threads {
            match thread.join() {
                Ok(ThreadExit::Completed) => {
                    tracing::debug!(thread = thread.name(), "Worker joined");
                }
                Ok(ThreadExit::Faulted(fault)) => {
                    tracing::debug!(
                        thread = thread.name(),
                        code = fault.code(),
                        "Worker joined after fault"
                    );
                }
                Err(e) => tracing::error!(thread = thread.name(), "Worker ended abnormally: {}", e),
            }
            joined += 1;
        }

        tracing::info!(joined, "All workers joined");
        joined
    }

    /// Request a process-wide stop.
    pub fn stop(&self) {
        self.stop.request();
    }

    /// The shared stop event, for handing to code outside the workers
    pub fn stop_event(&self) -> Arc<StopEvent> {
        Arc::clone(&self.stop)
    }

    /// The wrapped process context
    pub fn process(&self) -> &Arc<ProcessContext> {
        &self.process
    }

    /// Workers attached and not yet joined
    pub fn thread_count(&self) -> usize {
        self.registry.lock().threads.len()
    }
}
