//! Linux-specific shared memory operations

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tomy::consts::SHM_PREFIX;

/// Directory backing POSIX shared memory on Linux.
pub const SHM_DIR: &str = "/dev/shm";

/// Project id mixed into every key, as `ftok(path, 1)`.
const KEY_PROJECT_ID: libc::c_int = 1;

/// Segment files are readable and writable by owner and group so that
/// daemons running under different users of one group can attach.
const SEGMENT_MODE: u32 = 0o660;

/// Derive an IPC key from an existing file, like `ftok(3)`.
///
/// The same path (same inode) yields the same key in every process.
pub fn ipc_key(path: &Path) -> ShmResult<libc::key_t> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| ShmError::InvalidName {
        name: path.display().to_string(),
    })?;

    let key = unsafe { libc::ftok(c_path.as_ptr(), KEY_PROJECT_ID) };
    if key == -1 {
        return Err(ShmError::InvalidKey {
            path: path.to_path_buf(),
            source: Errno::last(),
        });
    }
    Ok(key)
}

/// Path of the segment file for a key file.
pub fn segment_path(key_path: &Path) -> ShmResult<PathBuf> {
    let key = ipc_key(key_path)?;
    Ok(PathBuf::from(format!("{SHM_DIR}/{SHM_PREFIX}{:08x}", key as u32)))
}

/// Create a fresh zero-filled segment, replacing any stale file left by a
/// previous owner.
pub fn create_segment_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    if path.exists() {
        tracing::warn!(path = %path.display(), "Removing stale segment");
        std::fs::remove_file(path)?;
    }

    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(SEGMENT_MODE)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => ShmError::AlreadyExists {
                name: path.display().to_string(),
            },
            _ => ShmError::Io { source: e },
        })?;

    // A new file is sparse; set_len zero-fills it.
    file.set_len(size as u64)?;

    let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
    Ok(mmap)
}

/// Attach to a segment created by another process.
pub fn attach_segment_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShmError::NotFound {
                name: path.display().to_string(),
            },
            _ => ShmError::Io { source: e },
        })?;

    let found = file.metadata()?.len() as usize;
    if found != size {
        return Err(ShmError::LayoutMismatch {
            name: path.display().to_string(),
            expected: size,
            found,
        });
    }

    let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
    Ok(mmap)
}

/// Remove a segment file; a missing file is not an error.
pub fn remove_segment(path: &Path) -> ShmResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Absolute `timespec` on `CLOCK_REALTIME`, `ms` milliseconds from now.
///
/// `sem_timedwait` and `pthread_mutex_timedlock` only accept realtime
/// deadlines.
pub fn realtime_deadline(ms: u32) -> libc::timespec {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };

    let ms = u64::from(ms);
    let ns_total = ts.tv_nsec as u64 + (ms % 1000) * 1_000_000;
    ts.tv_sec += (ms / 1000) as libc::time_t + (ns_total / 1_000_000_000) as libc::time_t;
    ts.tv_nsec = (ns_total % 1_000_000_000) as libc::c_long;
    ts
}
