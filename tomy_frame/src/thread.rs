//! Worker threads and the fault boundary around their units of work
//!
//! A [`Runnable`] is started on its own OS thread by [`WorkerThread::start`].
//! The thread entry runs it through one boundary function:
//!
//! - `Ok(())` ends the thread normally
//! - a non-fatal [`Fault`] is logged and absorbed
//! - a fatal [`Fault`] is logged and requests a process-wide stop
//! - any other error, or a panic, ends the thread abnormally and is only
//!   reported by [`WorkerThread::join`]; it does not stop the process
//!
//! Threads cannot be cancelled. Long-running units poll
//! [`WorkerContext::is_stopping`] and return when it turns true.

use crate::context::ProcessContext;
use crate::error::{FrameError, FrameResult};
use crate::fault::Fault;
use crate::params::ParamSource;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, ThreadId};
use tomy_shared_memory::CountingSignal;

/// What a unit of work returns. Return a [`Fault`] to classify the failure.
pub type RunResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A unit of work executed by a [`WorkerThread`].
pub trait Runnable: Send + 'static {
    /// Called once before the thread starts.
    fn initialized(&mut self, _params: &dyn ParamSource) {}

    /// Body of the thread. Runs once; loop internally for a service.
    fn run(&mut self, ctx: &WorkerContext) -> RunResult;
}

impl<F> Runnable for F
where
    F: FnMut(&WorkerContext) -> RunResult + Send + 'static,
{
    fn run(&mut self, ctx: &WorkerContext) -> RunResult {
        self(ctx)
    }
}

/// Process-wide stop request shared by all workers of a process.
///
/// Requesting posts the signal that `MultiThreadedProcessContext::run`
/// blocks on and raises a flag that workers poll.
pub struct StopEvent {
    signal: CountingSignal,
    requested: AtomicBool,
}

impl StopEvent {
    /// No stop requested yet
    pub fn new() -> Self {
        Self {
            signal: CountingSignal::new(),
            requested: AtomicBool::new(false),
        }
    }

    /// Ask the process to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.signal.post();
    }

    /// True once a stop was requested or shutdown has begun.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// The underlying counting signal
    pub fn signal(&self) -> &CountingSignal {
        &self.signal
    }

    /// Raise the flag without posting; used once shutdown is under way.
    pub(crate) fn mark_stopping(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

impl Default for StopEvent {
    fn default() -> Self {
        Self::new()
    }
}

/// What a unit of work can reach from inside its thread.
pub struct WorkerContext {
    process: Arc<ProcessContext>,
    stop: Arc<StopEvent>,
    name: String,
}

impl WorkerContext {
    /// Logging and parameters of the owning process
    pub fn process(&self) -> &ProcessContext {
        &self.process
    }

    /// Request a process-wide stop.
    pub fn stop_process(&self) {
        self.stop.request();
    }

    /// True once the process is shutting down.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_requested()
    }

    /// Name the worker was attached with
    pub fn thread_name(&self) -> &str {
        &self.name
    }
}

/// How a worker's unit of work ended, when it ended normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadExit {
    /// `run` returned `Ok(())`
    Completed,
    /// `run` returned a [`Fault`] that the boundary logged (and escalated if fatal)
    Faulted(Fault),
}

enum State {
    Ready(Box<dyn Runnable>),
    Running(JoinHandle<Result<ThreadExit, String>>),
    Joined,
}

/// One OS thread executing a [`Runnable`].
pub struct WorkerThread {
    name: String,
    state: State,
    id: Option<ThreadId>,
}

impl WorkerThread {
    /// Worker that has not been started yet
    pub fn new(name: impl Into<String>, unit: impl Runnable) -> Self {
        Self {
            name: name.into(),
            state: State::Ready(Box::new(unit)),
            id: None,
        }
    }

    /// Run the unit's `initialized` hook. No effect once started.
    pub fn initialize(&mut self, params: &dyn ParamSource) {
        if let State::Ready(unit) = &mut self.state {
            unit.initialized(params);
        }
    }

    /// Spawn the OS thread.
    pub fn start(&mut self, process: Arc<ProcessContext>, stop: Arc<StopEvent>) -> FrameResult<()> {
        let mut unit = match std::mem::replace(&mut self.state, State::Joined) {
            State::Ready(unit) => unit,
            other => {
                self.state = other;
                return Err(FrameError::AlreadyStarted {
                    name: self.name.clone(),
                });
            }
        };

        let ctx = WorkerContext {
            process,
            stop,
            name: self.name.clone(),
        };
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_guarded(unit.as_mut(), &ctx))
            .map_err(|source| FrameError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        self.id = Some(handle.thread().id());
        self.state = State::Running(handle);
        tracing::debug!(thread = %self.name, "Worker thread started");
        Ok(())
    }

    /// Wait for the thread to end.
    ///
    /// Absorbed faults come back as [`ThreadExit::Faulted`]; errors that
    /// are not faults and panics come back as `Err`.
    pub fn join(&mut self) -> FrameResult<ThreadExit> {
        let handle = match std::mem::replace(&mut self.state, State::Joined) {
            State::Running(handle) => handle,
            State::Ready(unit) => {
                self.state = State::Ready(unit);
                return Err(FrameError::NotStarted {
                    name: self.name.clone(),
                });
            }
            State::Joined => {
                return Err(FrameError::AlreadyJoined {
                    name: self.name.clone(),
                });
            }
        };

        match handle.join() {
            Ok(Ok(exit)) => Ok(exit),
            Ok(Err(reason)) => Err(FrameError::Aborted {
                name: self.name.clone(),
                reason,
            }),
            Err(payload) => Err(FrameError::Panicked {
                name: self.name.clone(),
                reason: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS thread identity, once started
    pub fn id(&self) -> Option<ThreadId> {
        self.id
    }

    /// True if both workers were started and run on the same thread.
    pub fn equals(&self, other: &WorkerThread) -> bool {
        self.id.is_some() && self.id == other.id
    }

    /// Identity of the calling thread
    pub fn current_id() -> ThreadId {
        std::thread::current().id()
    }

    /// True when called from inside this worker's thread.
    pub fn is_current(&self) -> bool {
        self.id == Some(Self::current_id())
    }

    /// True once the unit of work has returned (or the thread was joined).
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Ready(_) => false,
            State::Running(handle) => handle.is_finished(),
            State::Joined => true,
        }
    }
}

impl std::fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Thread entry: run the unit once and classify how it ended.
fn run_guarded(unit: &mut dyn Runnable, ctx: &WorkerContext) -> Result<ThreadExit, String> {
    let err = match unit.run(ctx) {
        Ok(()) => {
            tracing::debug!(thread = %ctx.name, "Worker finished");
            return Ok(ThreadExit::Completed);
        }
        Err(err) => err,
    };

    match err.downcast::<Fault>() {
        Ok(fault) => {
            fault.write_message(ctx.process());
            if fault.is_fatal() {
                tracing::error!(thread = %ctx.name, "Fatal fault, requesting process stop");
                ctx.stop_process();
            }
            Ok(ThreadExit::Faulted(*fault))
        }
        Err(other) => {
            tracing::error!(thread = %ctx.name, "Worker aborted by unhandled error: {}", other);
            Err(other.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_event_request_posts_once() {
        let stop = StopEvent::new();
        assert!(!stop.is_requested());
        stop.request();
        assert!(stop.is_requested());
        assert!(stop.signal().try_wait());
        assert!(!stop.signal().try_wait());
    }

    #[test]
    fn test_mark_stopping_does_not_post() {
        let stop = StopEvent::new();
        stop.mark_stopping();
        assert!(stop.is_requested());
        assert!(!stop.signal().try_wait());
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_unstarted_worker_state() {
        let worker = WorkerThread::new("idle", |_: &WorkerContext| -> RunResult { Ok(()) });
        assert_eq!(worker.name(), "idle");
        assert!(worker.id().is_none());
        assert!(!worker.is_finished());
        assert!(!worker.is_current());
        assert!(!worker.equals(&worker));
    }
}
