//! Process-local and cross-process mutual exclusion
//!
//! A [`Lock`] is either a plain in-process mutex or a robust
//! `PTHREAD_PROCESS_SHARED` mutex living inside a [`NamedSegment`], so that
//! independent processes attaching through the same key file exclude each
//! other.
//!
//! Locking hands out a [`LockGuard`]; the lock is released when the guard is
//! dropped (or [`LockGuard::unlock`] is called). Only the holder owns a
//! guard, so an unlock by a thread that does not hold the lock cannot be
//! written. The underlying pthread mutex would have undefined behavior in
//! that case.

use crate::error::{ShmError, ShmResult};
use crate::segment::{NamedSegment, SegmentRole};
use nix::errno::Errno;
use std::path::Path;

// Robust mutex symbols are not exposed by `libc` on every target.
unsafe extern "C" {
    fn pthread_mutexattr_setrobust(
        attr: *mut libc::pthread_mutexattr_t,
        robustness: libc::c_int,
    ) -> libc::c_int;
    fn pthread_mutex_consistent(mutex: *mut libc::pthread_mutex_t) -> libc::c_int;
}

const PTHREAD_MUTEX_ROBUST: libc::c_int = 1;

/// Mutual exclusion usable within a process or across processes
pub struct Lock {
    inner: LockImpl,
}

enum LockImpl {
    Local(parking_lot::Mutex<()>),
    Named(NamedMutex),
}

/// Proof of holding a [`Lock`]; releases it on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    inner: GuardImpl<'a>,
}

enum GuardImpl<'a> {
    Local(#[allow(dead_code)] parking_lot::MutexGuard<'a, ()>),
    Named(&'a NamedMutex),
}

impl Lock {
    /// Process-local lock
    pub fn new() -> Self {
        Self {
            inner: LockImpl::Local(parking_lot::Mutex::new(())),
        }
    }

    /// Cross-process lock identified by an existing key file.
    ///
    /// The `Owner` creates and initializes the mutex; `Attach` handles
    /// require the owner to exist already.
    pub fn named(key_path: &Path, role: SegmentRole) -> ShmResult<Self> {
        Ok(Self {
            inner: LockImpl::Named(NamedMutex::open(key_path, role)?),
        })
    }

    /// Block until the lock is acquired.
    ///
    /// For a named lock whose previous holder died while holding it, the
    /// mutex is made consistent again and acquisition succeeds.
    pub fn lock(&self) -> ShmResult<LockGuard<'_>> {
        let inner = match &self.inner {
            LockImpl::Local(mutex) => GuardImpl::Local(mutex.lock()),
            LockImpl::Named(mutex) => {
                mutex.lock()?;
                GuardImpl::Named(mutex)
            }
        };
        Ok(LockGuard { inner })
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock(&self) -> ShmResult<Option<LockGuard<'_>>> {
        let inner = match &self.inner {
            LockImpl::Local(mutex) => mutex.try_lock().map(GuardImpl::Local),
            LockImpl::Named(mutex) => mutex.try_lock()?.then_some(GuardImpl::Named(mutex)),
        };
        Ok(inner.map(|inner| LockGuard { inner }))
    }

    /// True for a cross-process lock
    pub fn is_named(&self) -> bool {
        matches!(self.inner, LockImpl::Named(_))
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl LockGuard<'_> {
    /// Release the lock now. Same as dropping the guard.
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let GuardImpl::Named(mutex) = self.inner {
            mutex.unlock();
        }
    }
}

/// `pthread_mutex_t` stored in a named segment
struct NamedMutex {
    segment: NamedSegment<libc::pthread_mutex_t>,
}

impl NamedMutex {
    fn open(key_path: &Path, role: SegmentRole) -> ShmResult<Self> {
        let segment = NamedSegment::<libc::pthread_mutex_t>::open(key_path, role)?;
        if role.is_owner() {
            unsafe { init_shared_mutex(segment.as_ptr())? };
        }
        Ok(Self { segment })
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.segment.as_ptr()
    }

    fn lock(&self) -> ShmResult<()> {
        let eno = unsafe { libc::pthread_mutex_lock(self.raw()) };
        self.check_acquired(eno).map(|_| ())
    }

    fn try_lock(&self) -> ShmResult<bool> {
        let eno = unsafe { libc::pthread_mutex_trylock(self.raw()) };
        match eno {
            libc::EBUSY => Ok(false),
            _ => self.check_acquired(eno),
        }
    }

    fn check_acquired(&self, eno: libc::c_int) -> ShmResult<bool> {
        match eno {
            0 => Ok(true),
            libc::EOWNERDEAD => {
                tracing::warn!(
                    path = %self.segment.path().display(),
                    "Previous lock holder died, recovering mutex"
                );
                let eno = unsafe { pthread_mutex_consistent(self.raw()) };
                if eno != 0 {
                    return Err(ShmError::Nix {
                        source: Errno::from_raw(eno),
                    });
                }
                Ok(true)
            }
            _ => Err(ShmError::Nix {
                source: Errno::from_raw(eno),
            }),
        }
    }

    fn unlock(&self) {
        let eno = unsafe { libc::pthread_mutex_unlock(self.raw()) };
        if eno != 0 {
            tracing::error!(
                path = %self.segment.path().display(),
                "pthread_mutex_unlock failed: {}",
                Errno::from_raw(eno)
            );
        }
    }
}

/// Initialize a process-shared robust mutex in place.
///
/// # Safety
/// `mutex` must point to writable memory for a `pthread_mutex_t` that no
/// other thread or process is using yet.
unsafe fn init_shared_mutex(mutex: *mut libc::pthread_mutex_t) -> ShmResult<()> {
    let to_err = |eno: libc::c_int| ShmError::Nix {
        source: Errno::from_raw(eno),
    };

    unsafe {
        let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
        let eno = libc::pthread_mutexattr_init(&mut attr);
        if eno != 0 {
            return Err(to_err(eno));
        }

        let mut eno = libc::pthread_mutexattr_setpshared(&mut attr, libc::PTHREAD_PROCESS_SHARED);
        if eno == 0 {
            eno = pthread_mutexattr_setrobust(&mut attr, PTHREAD_MUTEX_ROBUST);
        }
        if eno == 0 {
            eno = libc::pthread_mutex_init(mutex, &attr);
        }
        libc::pthread_mutexattr_destroy(&mut attr);

        if eno != 0 {
            return Err(to_err(eno));
        }
    }
    Ok(())
}
