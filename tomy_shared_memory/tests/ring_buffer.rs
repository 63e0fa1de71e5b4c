//! Ring buffer behavior through named segments

use tempfile::NamedTempFile;
use tomy_shared_memory::{
    LogLevel, PROCESS_LOG_BUFFER_SIZE, RINGBUFFER_SIZE, RingBuffer, RingHeader, SegmentRole,
    ShmError, ShmResult,
};

struct Keys {
    segment: NamedTempFile,
    lock: NamedTempFile,
}

fn keys() -> Keys {
    tomy_shared_memory::init_tracing(LogLevel::Debug);
    Keys {
        segment: NamedTempFile::new().expect("segment key"),
        lock: NamedTempFile::new().expect("lock key"),
    }
}

fn open(keys: &Keys, role: SegmentRole) -> ShmResult<RingBuffer> {
    RingBuffer::open(keys.segment.path(), keys.lock.path(), role)
}

#[test]
fn test_attached_writer_owner_reader() -> ShmResult<()> {
    let keys = keys();
    let owner = open(&keys, SegmentRole::Owner)?;
    let writer = open(&keys, SegmentRole::Attach)?;

    for i in 0..10 {
        writer.put(format!("record {i}").as_bytes())?;
    }
    for i in 0..10 {
        assert_eq!(owner.get(PROCESS_LOG_BUFFER_SIZE)?, format!("record {i}").into_bytes());
    }
    assert!(owner.get(PROCESS_LOG_BUFFER_SIZE)?.is_empty());
    Ok(())
}

#[test]
fn test_attach_before_owner_fails() {
    let keys = keys();
    assert!(matches!(
        open(&keys, SegmentRole::Attach),
        Err(ShmError::NotFound { .. })
    ));
}

#[test]
fn test_new_owner_starts_empty() -> ShmResult<()> {
    let keys = keys();
    {
        let first = open(&keys, SegmentRole::Owner)?;
        first.put(b"from a previous run")?;
    }
    let second = open(&keys, SegmentRole::Owner)?;
    assert!(second.is_empty()?);
    assert_eq!(second.header()?, RingHeader::default());
    Ok(())
}

#[test]
fn test_reset_visible_to_attached() -> ShmResult<()> {
    let keys = keys();
    let owner = open(&keys, SegmentRole::Owner)?;
    let attached = open(&keys, SegmentRole::Attach)?;

    attached.put(b"one")?;
    attached.put(b"two")?;
    owner.reset()?;
    assert!(attached.get(64)?.is_empty());
    Ok(())
}

#[test]
fn test_overflow_keeps_most_recent() -> ShmResult<()> {
    let keys = keys();
    let ring = open(&keys, SegmentRole::Owner)?;

    let total = RINGBUFFER_SIZE * 3;
    let mut written = 0;
    let mut n = 0;
    while written < total {
        let record = format!("{n:06}:{}", "x".repeat(500));
        written += record.len() + 1;
        ring.put(record.as_bytes())?;
        n += 1;
    }
    let header = ring.header()?;
    assert!((header.start as usize) < RINGBUFFER_SIZE);
    assert!((header.end as usize) < RINGBUFFER_SIZE);

    let mut last = Vec::new();
    let mut first = None;
    loop {
        let record = ring.get(PROCESS_LOG_BUFFER_SIZE)?;
        if record.is_empty() {
            break;
        }
        first.get_or_insert_with(|| record.clone());
        last = record;
    }
    assert_eq!(&last[..6], format!("{:06}", n - 1).as_bytes());
    assert_ne!(first.unwrap()[..6], *b"000000", "oldest records must be gone");
    Ok(())
}

#[test]
fn test_concurrent_writers_lose_nothing_within_capacity() -> ShmResult<()> {
    let keys = keys();
    let owner = open(&keys, SegmentRole::Owner)?;
    let writers: Vec<_> = (0..4)
        .map(|_| open(&keys, SegmentRole::Attach))
        .collect::<Result<_, _>>()?;

    std::thread::scope(|s| {
        for (w, ring) in writers.iter().enumerate() {
            s.spawn(move || {
                for i in 0..50 {
                    ring.put(format!("w{w}-{i:02}").as_bytes()).unwrap();
                }
            });
        }
    });

    let mut per_writer = vec![Vec::new(); 4];
    loop {
        let record = String::from_utf8(owner.get(64)?).unwrap();
        if record.is_empty() {
            break;
        }
        let (w, i) = record[1..].split_once('-').unwrap();
        per_writer[w.parse::<usize>().unwrap()].push(i.parse::<u32>().unwrap());
    }
    for seq in per_writer {
        assert_eq!(seq, (0..50).collect::<Vec<_>>(), "each writer's records stay in order");
    }
    Ok(())
}
