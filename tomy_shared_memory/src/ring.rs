//! Shared-memory ring buffer for cross-process log aggregation
//!
//! One segment per key file holds a [`RingSegment`]: three `u16` header
//! fields (`length`, `start`, `end`) immediately followed by a fixed
//! [`RINGBUFFER_SIZE`] byte payload. The layout is `#[repr(C)]` and must not
//! change, since every attached process maps the same bytes.
//!
//! Records are NUL-terminated byte strings of at most
//! [`PROCESS_LOG_BUFFER_SIZE`] bytes. When a new record does not fit, whole
//! records are discarded from the head until it does, so the buffer always
//! keeps the most recent data and `get` never sees a torn record.

use crate::error::ShmResult;
use crate::lock::Lock;
use crate::segment::{NamedSegment, SegmentRole};
use static_assertions::const_assert_eq;
use std::path::Path;
use tomy::consts::{PROCESS_LOG_BUFFER_SIZE, RINGBUFFER_SIZE};

/// Record delimiter
pub const RECORD_DELIMITER: u8 = 0;

/// Ring header; all offsets are in `[0, RINGBUFFER_SIZE)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingHeader {
    /// Number of valid bytes (records plus delimiters)
    pub length: u16,
    /// Offset of the oldest byte
    pub start: u16,
    /// Offset where the next byte is written
    pub end: u16,
}

/// Complete segment layout: header followed by payload
#[repr(C)]
pub struct RingSegment {
    /// Header
    pub header: RingHeader,
    /// Circular payload area
    pub payload: [u8; RINGBUFFER_SIZE],
}

const_assert_eq!(std::mem::size_of::<RingHeader>(), 6);
const_assert_eq!(std::mem::size_of::<RingSegment>(), 6 + RINGBUFFER_SIZE);
const_assert_eq!(std::mem::align_of::<RingSegment>(), 2);

const CAPACITY: usize = RINGBUFFER_SIZE;

impl RingSegment {
    /// Empty segment on the heap (test and benchmark helper)
    pub fn boxed() -> Box<Self> {
        Box::new(Self {
            header: RingHeader::default(),
            payload: [0; RINGBUFFER_SIZE],
        })
    }

    /// Forget all data.
    pub fn reset(&mut self) {
        self.header = RingHeader::default();
    }

    /// Header invariant: offsets in range and length consistent with them.
    pub fn is_consistent(&self) -> bool {
        let h = self.header;
        let (len, start, end) = (h.length as usize, h.start as usize, h.end as usize);
        start < CAPACITY && end < CAPACITY && len <= CAPACITY && (start + len) % CAPACITY == end
    }

    /// Append one record, discarding the oldest records if space is short.
    ///
    /// The record is cut at its first NUL and bounded to
    /// [`PROCESS_LOG_BUFFER_SIZE`] bytes. Empty records are ignored.
    pub fn put(&mut self, record: &[u8]) {
        let record = bounded_record(record);
        if record.is_empty() {
            return;
        }
        if !self.is_consistent() {
            tracing::warn!(header = ?self.header, "Corrupt ring header, resetting");
            self.reset();
        }

        let need = record.len() + 1;
        while CAPACITY - (self.header.length as usize) < need {
            self.drop_oldest();
        }

        let end = self.header.end as usize;
        self.copy_in(end, record);
        self.payload[(end + record.len()) % CAPACITY] = RECORD_DELIMITER;

        self.header.end = ((end + need) % CAPACITY) as u16;
        self.header.length += need as u16;
    }

    /// Remove the oldest record and return at most `max_bytes` of it.
    ///
    /// Returns an empty vector if the buffer is empty. The remainder of a
    /// record longer than `max_bytes` is discarded with it. With
    /// `max_bytes == 0` nothing is removed.
    pub fn get(&mut self, max_bytes: usize) -> Vec<u8> {
        if self.header.length == 0 || max_bytes == 0 {
            return Vec::new();
        }
        if !self.is_consistent() {
            tracing::warn!(header = ?self.header, "Corrupt ring header, resetting");
            self.reset();
            return Vec::new();
        }

        let (record_len, consumed) = self.head_record();
        let start = self.header.start as usize;
        let out = self.copy_out(start, record_len.min(max_bytes));

        self.advance(consumed);
        out
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.header.length as usize
    }

    /// True if no record is stored
    pub fn is_empty(&self) -> bool {
        self.header.length == 0
    }

    fn drop_oldest(&mut self) {
        let (_, consumed) = self.head_record();
        self.advance(consumed);
    }

    /// Length of the head record and the bytes it occupies with its
    /// delimiter. Without a delimiter the whole valid region counts.
    fn head_record(&self) -> (usize, usize) {
        let start = self.header.start as usize;
        let length = self.header.length as usize;
        (0..length)
            .find(|&i| self.payload[(start + i) % CAPACITY] == RECORD_DELIMITER)
            .map_or((length, length), |i| (i, i + 1))
    }

    fn advance(&mut self, consumed: usize) {
        let start = self.header.start as usize;
        self.header.start = ((start + consumed) % CAPACITY) as u16;
        self.header.length -= consumed as u16;
    }

    fn copy_in(&mut self, at: usize, bytes: &[u8]) {
        let first = bytes.len().min(CAPACITY - at);
        self.payload[at..at + first].copy_from_slice(&bytes[..first]);
        self.payload[..bytes.len() - first].copy_from_slice(&bytes[first..]);
    }

    fn copy_out(&self, at: usize, len: usize) -> Vec<u8> {
        let first = len.min(CAPACITY - at);
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.payload[at..at + first]);
        out.extend_from_slice(&self.payload[..len - first]);
        out
    }
}

fn bounded_record(record: &[u8]) -> &[u8] {
    let end = record
        .iter()
        .position(|&b| b == RECORD_DELIMITER)
        .unwrap_or(record.len())
        .min(PROCESS_LOG_BUFFER_SIZE);
    &record[..end]
}

/// Ring buffer in a named segment, guarded by a named [`Lock`]
pub struct RingBuffer {
    segment: NamedSegment<RingSegment>,
    lock: Lock,
}

impl RingBuffer {
    /// Payload capacity in bytes
    pub const CAPACITY: usize = RINGBUFFER_SIZE;

    /// Open the segment and its lock.
    ///
    /// The `Owner` starts from an empty buffer, so records from a previous
    /// run are never replayed.
    pub fn open(segment_key: &Path, lock_key: &Path, role: SegmentRole) -> ShmResult<Self> {
        let lock = Lock::named(lock_key, role)?;
        let segment = NamedSegment::<RingSegment>::open(segment_key, role)?;
        let ring = Self { segment, lock };
        if role.is_owner() {
            ring.reset()?;
        }
        tracing::info!(
            segment = %ring.segment.path().display(),
            ?role,
            capacity = Self::CAPACITY,
            "Ring buffer ready"
        );
        Ok(ring)
    }

    /// Append one record under the lock.
    pub fn put(&self, record: &[u8]) -> ShmResult<()> {
        self.with_segment(|seg| seg.put(record))
    }

    /// Remove and return the oldest record (at most `max_bytes` of it).
    pub fn get(&self, max_bytes: usize) -> ShmResult<Vec<u8>> {
        self.with_segment(|seg| seg.get(max_bytes))
    }

    /// Zero `length`, `start` and `end`.
    pub fn reset(&self) -> ShmResult<()> {
        self.with_segment(RingSegment::reset)
    }

    /// Number of valid bytes (racy snapshot)
    pub fn len(&self) -> ShmResult<usize> {
        self.with_segment(|seg| seg.len())
    }

    /// True if the buffer holds no record (racy snapshot)
    pub fn is_empty(&self) -> ShmResult<bool> {
        self.with_segment(|seg| seg.is_empty())
    }

    /// Copy of the header (diagnostics)
    pub fn header(&self) -> ShmResult<RingHeader> {
        self.with_segment(|seg| seg.header)
    }

    /// Role this process plays for the segment
    pub fn role(&self) -> SegmentRole {
        self.segment.role()
    }

    fn with_segment<R>(&self, f: impl FnOnce(&mut RingSegment) -> R) -> ShmResult<R> {
        let _guard = self.lock.lock()?;
        // Safety: the named lock serializes every access from every process.
        let seg = unsafe { &mut *self.segment.as_ptr() };
        Ok(f(seg))
    }
}
