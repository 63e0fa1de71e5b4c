//! Named shared memory segments with explicit ownership

use crate::error::ShmResult;
use crate::platform::{attach_segment_mmap, create_segment_mmap, remove_segment, segment_path};
use memmap2::MmapMut;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// How a process relates to a named resource.
///
/// Exactly one process per resource is the `Owner`: it creates the resource,
/// initializes it and removes it again when dropped. Every other process
/// uses `Attach` and fails with `ShmError::NotFound` if the owner has not
/// created the resource yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    /// Create (replacing stale leftovers), initialize, tear down on drop
    Owner,
    /// Open an existing resource; never removes it
    Attach,
}

impl SegmentRole {
    /// True for [`SegmentRole::Owner`]
    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }
}

/// A shared memory segment holding exactly one `T`.
///
/// The segment is located through a key file (see [`crate::platform::ipc_key`]).
/// A freshly created segment is zero-filled; `T` must be valid when zeroed.
/// Accesses to the `T` go through raw pointers and must be serialized by the
/// caller (typically with a named [`crate::Lock`]).
pub struct NamedSegment<T> {
    path: PathBuf,
    role: SegmentRole,
    ptr: NonNull<T>,
    // Keeps the mapping alive for `ptr`.
    _mmap: MmapMut,
    _marker: PhantomData<T>,
}

// Safety: the mapping is shared between processes anyway; callers
// serialize access to the contained `T`.
unsafe impl<T: Send> Send for NamedSegment<T> {}
unsafe impl<T: Send> Sync for NamedSegment<T> {}

impl<T> NamedSegment<T> {
    /// Create or attach the segment derived from `key_path`.
    pub fn open(key_path: &Path, role: SegmentRole) -> ShmResult<Self> {
        let path = segment_path(key_path)?;
        let size = std::mem::size_of::<T>();

        let mut mmap = match role {
            SegmentRole::Owner => create_segment_mmap(&path, size)?,
            SegmentRole::Attach => attach_segment_mmap(&path, size)?,
        };

        let ptr = NonNull::new(mmap.as_mut_ptr() as *mut T)
            .ok_or_else(|| std::io::Error::other("mmap returned a null mapping"))?;
        debug_assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<T>(), 0);

        tracing::debug!(path = %path.display(), ?role, size, "Segment mapped");

        Ok(Self {
            path,
            role,
            ptr,
            _mmap: mmap,
            _marker: PhantomData,
        })
    }

    /// Raw pointer to the shared value
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Role this handle was opened with
    pub fn role(&self) -> SegmentRole {
        self.role
    }

    /// Backing file under `/dev/shm`
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> Drop for NamedSegment<T> {
    fn drop(&mut self) {
        if self.role.is_owner() {
            if let Err(e) = remove_segment(&self.path) {
                tracing::warn!(path = %self.path.display(), "Segment teardown failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShmError;

    #[repr(C)]
    struct Pair {
        a: u32,
        b: u32,
    }

    #[test]
    fn test_owner_and_attach_share_memory() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let owner = NamedSegment::<Pair>::open(key.path(), SegmentRole::Owner).unwrap();
        let attached = NamedSegment::<Pair>::open(key.path(), SegmentRole::Attach).unwrap();

        unsafe {
            assert_eq!((*owner.as_ptr()).a, 0);
            (*owner.as_ptr()).b = 42;
            assert_eq!((*attached.as_ptr()).b, 42);
        }
        assert_eq!(owner.path(), attached.path());
    }

    #[test]
    fn test_attach_without_owner_fails() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let result = NamedSegment::<Pair>::open(key.path(), SegmentRole::Attach);
        assert!(matches!(result, Err(ShmError::NotFound { .. })));
    }

    #[test]
    fn test_owner_drop_removes_file() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let owner = NamedSegment::<Pair>::open(key.path(), SegmentRole::Owner).unwrap();
        let path = owner.path().to_path_buf();
        assert!(path.exists());
        drop(owner);
        assert!(!path.exists());
    }

    #[test]
    fn test_attach_drop_keeps_file() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let owner = NamedSegment::<Pair>::open(key.path(), SegmentRole::Owner).unwrap();
        let attached = NamedSegment::<Pair>::open(key.path(), SegmentRole::Attach).unwrap();
        drop(attached);
        assert!(owner.path().exists());
    }

    #[test]
    fn test_attach_size_mismatch() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let _owner = NamedSegment::<Pair>::open(key.path(), SegmentRole::Owner).unwrap();
        let result = NamedSegment::<[u8; 3]>::open(key.path(), SegmentRole::Attach);
        assert!(matches!(result, Err(ShmError::LayoutMismatch { expected: 3, found: 8, .. })));
    }
}
