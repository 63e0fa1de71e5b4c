//! Counting semaphores with blocking and timed waits
//!
//! A [`CountingSignal`] is either anonymous (process-local, built on
//! `parking_lot`) or named (a POSIX semaphore visible to every process that
//! opens the same `/name`).
//!
//! The wait and post operations do not return errors. The only failures a
//! valid semaphore can report are `EINTR`, which is retried, and counter
//! overflow on post, which is logged. Construction is where named
//! semaphores can fail, and it returns [`ShmResult`].

use crate::error::{ShmError, ShmResult};
use crate::platform::realtime_deadline;
use crate::segment::SegmentRole;
use nix::errno::Errno;
use parking_lot::{Condvar, Mutex};
use std::ffi::CString;
use std::time::{Duration, Instant};

/// Semaphores are readable and writable by owner and group.
const SEMAPHORE_MODE: libc::c_uint = 0o660;

/// Counting semaphore: `wait` decrements, blocking while the count is zero;
/// `post` increments and wakes one waiter.
pub struct CountingSignal {
    inner: SignalImpl,
}

enum SignalImpl {
    Local(LocalSemaphore),
    Named(NamedSemaphore),
}

impl CountingSignal {
    /// Process-local signal with count 0
    pub fn new() -> Self {
        Self::with_count(0)
    }

    /// Process-local signal with an initial count
    pub fn with_count(count: u32) -> Self {
        Self {
            inner: SignalImpl::Local(LocalSemaphore::new(count)),
        }
    }

    /// Named signal shared by every process opening `name` (`/name` form).
    ///
    /// `count` is only used by the `Owner`, which creates the semaphore.
    pub fn named(name: &str, count: u32, role: SegmentRole) -> ShmResult<Self> {
        Ok(Self {
            inner: SignalImpl::Named(NamedSemaphore::open(name, count, role)?),
        })
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self) {
        match &self.inner {
            SignalImpl::Local(sem) => sem.wait(),
            SignalImpl::Named(sem) => sem.wait(),
        }
    }

    /// Wait at most `ms` milliseconds.
    ///
    /// Returns `true` if the count was decremented, `false` if the timeout
    /// elapsed with the count still zero ("no event").
    pub fn timed_wait(&self, ms: u32) -> bool {
        match &self.inner {
            SignalImpl::Local(sem) => sem.timed_wait(Duration::from_millis(u64::from(ms))),
            SignalImpl::Named(sem) => sem.timed_wait(ms),
        }
    }

    /// Decrement if the count is positive, without blocking.
    pub fn try_wait(&self) -> bool {
        match &self.inner {
            SignalImpl::Local(sem) => sem.try_wait(),
            SignalImpl::Named(sem) => sem.try_wait(),
        }
    }

    /// Increment the count and wake one waiter. Never blocks.
    pub fn post(&self) {
        match &self.inner {
            SignalImpl::Local(sem) => sem.post(),
            SignalImpl::Named(sem) => sem.post(),
        }
    }

    /// Current count (diagnostics only; stale as soon as it is returned)
    pub fn value(&self) -> u32 {
        match &self.inner {
            SignalImpl::Local(sem) => *sem.count.lock(),
            SignalImpl::Named(sem) => sem.value(),
        }
    }
}

impl Default for CountingSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Local ──────────────────────────────────────────────────────────

struct LocalSemaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl LocalSemaphore {
    fn new(count: u32) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    fn timed_wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count == 0 {
            if self.cond.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn post(&self) {
        *self.count.lock() += 1;
        self.cond.notify_one();
    }
}

// ─── Named ──────────────────────────────────────────────────────────

struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: CString,
    role: SegmentRole,
}

// Safety: POSIX semaphores are designed for concurrent use from any thread.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    fn open(name: &str, count: u32, role: SegmentRole) -> ShmResult<Self> {
        if name.len() < 2 || !name.starts_with('/') || name[1..].contains('/') {
            return Err(ShmError::InvalidName {
                name: name.to_string(),
            });
        }
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName {
            name: name.to_string(),
        })?;

        let sem = match role {
            SegmentRole::Owner => {
                // A leftover from a crashed owner would carry a stale count.
                unsafe { libc::sem_unlink(c_name.as_ptr()) };
                unsafe {
                    libc::sem_open(
                        c_name.as_ptr(),
                        libc::O_CREAT | libc::O_EXCL,
                        SEMAPHORE_MODE,
                        count as libc::c_uint,
                    )
                }
            }
            SegmentRole::Attach => unsafe { libc::sem_open(c_name.as_ptr(), 0) },
        };

        if sem == libc::SEM_FAILED {
            return Err(match Errno::last() {
                Errno::ENOENT => ShmError::NotFound {
                    name: name.to_string(),
                },
                Errno::EEXIST => ShmError::AlreadyExists {
                    name: name.to_string(),
                },
                other => ShmError::Nix { source: other },
            });
        }

        tracing::debug!(name, ?role, "Named semaphore opened");
        Ok(Self {
            sem,
            name: c_name,
            role,
        })
    }

    fn wait(&self) {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                e => {
                    tracing::error!(name = ?self.name, "sem_wait failed: {}", e);
                    return;
                }
            }
        }
    }

    fn timed_wait(&self, ms: u32) -> bool {
        let deadline = realtime_deadline(ms);
        loop {
            if unsafe { libc::sem_timedwait(self.sem, &deadline) } == 0 {
                return true;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::ETIMEDOUT => return false,
                e => {
                    tracing::error!(name = ?self.name, "sem_timedwait failed: {}", e);
                    return false;
                }
            }
        }
    }

    fn try_wait(&self) -> bool {
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return true;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                _ => return false,
            }
        }
    }

    fn post(&self) {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            tracing::error!(name = ?self.name, "sem_post failed: {}", Errno::last());
        }
    }

    fn value(&self) -> u32 {
        let mut value: libc::c_int = 0;
        unsafe { libc::sem_getvalue(self.sem, &mut value) };
        value.max(0) as u32
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_close(self.sem) };
        if self.role.is_owner() {
            unsafe { libc::sem_unlink(self.name.as_ptr()) };
        }
    }
}
