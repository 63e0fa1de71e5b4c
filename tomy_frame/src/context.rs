//! Per-process state: parameters and the shared log channel
//!
//! Every daemon builds one [`ProcessContext`] and passes it (usually inside
//! an `Arc`) to whatever needs logging or parameters. Log records written
//! with [`ProcessContext::put_log`] land in the cross-process
//! [`RingBuffer`]; the log monitor process drains them with
//! [`ProcessContext::get_log`].

use crate::os_signal;
use crate::params::{ParamSource, ProcessArgs};
use nix::sys::signal::Signal;
use parking_lot::{Mutex, MutexGuard};
use std::fmt::{self, Write};
use std::ops::Deref;
use tomy::config::RingBufferConfig;
use tomy::consts::{PROCESS_LOG_BUFFER_SIZE, SIGNAL_POLL_MS};
use tomy_shared_memory::{CountingSignal, RingBuffer, SegmentRole, ShmResult};

type LogLine = heapless::String<PROCESS_LOG_BUFFER_SIZE>;

/// Process-wide logging and parameter access.
pub struct ProcessContext {
    source: Box<dyn ParamSource>,
    ring: RingBuffer,
    ring_signal: CountingSignal,
    write_line: Mutex<LogLine>,
    read_line: Mutex<LogLine>,
}

/// One record taken from the ring buffer.
///
/// Holds the context's read buffer until released, so a context hands out
/// one record at a time.
pub struct LogRecord<'a> {
    line: MutexGuard<'a, LogLine>,
}

impl ProcessContext {
    /// Context whose ring buffer resources come from `args.config()`.
    pub fn new(args: ProcessArgs, role: SegmentRole) -> ShmResult<Self> {
        let ring_config = args.config().ring_buffer.clone();
        Self::with_source(&ring_config, Box::new(args), role)
    }

    /// Context with an arbitrary parameter source.
    ///
    /// The `Owner` creates the ring segment, its lock and its semaphore;
    /// `Attach` requires them to exist.
    pub fn with_source(
        ring_config: &RingBufferConfig,
        source: Box<dyn ParamSource>,
        role: SegmentRole,
    ) -> ShmResult<Self> {
        let ring = RingBuffer::open(&ring_config.segment_key, &ring_config.lock_key, role)?;
        let ring_signal = CountingSignal::named(&ring_config.signal_name, 0, role)?;

        tracing::info!(
            segment = %ring_config.segment_key.display(),
            signal = %ring_config.signal_name,
            ?role,
            "Process context ready"
        );

        Ok(Self {
            source,
            ring,
            ring_signal,
            write_line: Mutex::new(LogLine::new()),
            read_line: Mutex::new(LogLine::new()),
        })
    }

    /// Format one record into the ring buffer and wake the reader.
    ///
    /// Records longer than [`PROCESS_LOG_BUFFER_SIZE`] bytes are truncated
    /// at a character boundary. Empty records are skipped.
    pub fn put_log(&self, args: fmt::Arguments<'_>) -> ShmResult<()> {
        let mut line = self.write_line.lock();
        line.clear();
        let _ = BoundedWriter(&mut *line).write_fmt(args);
        if line.is_empty() {
            return Ok(());
        }

        self.ring.put(line.as_bytes())?;
        self.ring_signal.post();
        Ok(())
    }

    /// Wait for the next record.
    ///
    /// Returns `None` once SIGINT or SIGTERM is pending (see
    /// [`crate::install_signal_handlers`]). The previous record must be
    /// released first.
    pub fn get_log(&self) -> ShmResult<Option<LogRecord<'_>>> {
        loop {
            if let Some(record) = self.try_get_log()? {
                return Ok(Some(record));
            }
            self.ring_signal.timed_wait(SIGNAL_POLL_MS);
            if let Some(signal) = os_signal::termination_requested() {
                tracing::info!(%signal, "Stopping log retrieval");
                return Ok(None);
            }
        }
    }

    /// Take the next record if one is buffered.
    pub fn try_get_log(&self) -> ShmResult<Option<LogRecord<'_>>> {
        let mut line = self.read_line.lock();
        let bytes = self.ring.get(PROCESS_LOG_BUFFER_SIZE)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        // Keep the semaphore in step with the records still buffered.
        self.ring_signal.try_wait();

        line.clear();
        let _ = BoundedWriter(&mut *line).write_str(&String::from_utf8_lossy(&bytes));
        Ok(Some(LogRecord { line }))
    }

    /// Hand a record back, making room for the next `get_log`.
    pub fn release_log(&self, record: LogRecord<'_>) {
        drop(record);
    }

    /// Empty the ring buffer.
    pub fn reset_ring_buffer(&self) -> ShmResult<()> {
        self.ring.reset()
    }

    /// Last SIGINT, SIGTERM or SIGHUP received.
    pub fn check_signal(&self) -> Option<Signal> {
        os_signal::check_signal()
    }

    /// Named parameter
    pub fn param(&self, name: &str) -> Option<String> {
        self.source.param(name)
    }

    /// Single-letter command line option
    pub fn argv(&self, option: char) -> Option<String> {
        self.source.argv(option)
    }

    /// Raw command line
    pub fn args(&self) -> &[String] {
        self.source.args()
    }

    /// Command line word count
    pub fn argc(&self) -> usize {
        self.source.argc()
    }

    /// The parameter source itself
    pub fn params(&self) -> &dyn ParamSource {
        self.source.as_ref()
    }

    /// Shared log buffer
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Ownership of the named resources
    pub fn role(&self) -> SegmentRole {
        self.ring.role()
    }
}

impl LogRecord<'_> {
    /// Record text
    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }
}

impl Deref for LogRecord<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogRecord").field(&self.as_str()).finish()
    }
}

/// Appends until the line is full, then silently drops the rest.
struct BoundedWriter<'a>(&'a mut LogLine);

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.0.push_str(s).is_ok() {
            return Ok(());
        }
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Write a formatted record to a [`ProcessContext`] log.
///
/// ```rust,no_run
/// # fn demo(ctx: &tomy_frame::ProcessContext) -> tomy_shared_memory::ShmResult<()> {
/// tomy_frame::log_write!(ctx, "connected to {}:{}", "localhost", 1883)?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! log_write {
    ($ctx:expr, $($arg:tt)+) => {
        $ctx.put_log(::std::format_args!($($arg)+))
    };
}
