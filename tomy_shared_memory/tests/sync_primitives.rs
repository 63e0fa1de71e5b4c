//! Lock and counting signal behavior across threads and handles

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tomy_shared_memory::{CountingSignal, Lock, SegmentRole, ShmResult};

// ─── Helpers ────────────────────────────────────────────────────────

fn unique_sem_name(suffix: &str) -> String {
    static CTR: AtomicU32 = AtomicU32::new(0);
    let id = CTR.fetch_add(1, Ordering::Relaxed);
    format!("/tomy_it_{}_{id}_{suffix}", std::process::id())
}

/// Increment `counter` with a separate load and store, so any overlap
/// between holders loses updates.
fn hammer(lock: &Lock, counter: &AtomicU64, rounds: u32) -> ShmResult<()> {
    for _ in 0..rounds {
        let _guard = lock.lock()?;
        let v = counter.load(Ordering::Relaxed);
        std::hint::spin_loop();
        counter.store(v + 1, Ordering::Relaxed);
    }
    Ok(())
}

// ─── Lock ───────────────────────────────────────────────────────────

#[test]
fn test_local_lock_no_lost_updates() -> ShmResult<()> {
    let lock = Arc::new(Lock::new());
    let counter = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || hammer(&lock, &counter, 10_000))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap()?;
    }

    assert_eq!(counter.load(Ordering::Relaxed), 20_000);
    Ok(())
}

#[test]
fn test_named_lock_no_lost_updates_between_handles() -> ShmResult<()> {
    let key = tempfile::NamedTempFile::new()?;
    let owner = Lock::named(key.path(), SegmentRole::Owner)?;
    let attached = Lock::named(key.path(), SegmentRole::Attach)?;
    let counter = AtomicU64::new(0);

    std::thread::scope(|s| -> ShmResult<()> {
        let a = s.spawn(|| hammer(&owner, &counter, 10_000));
        let b = s.spawn(|| hammer(&attached, &counter, 10_000));
        a.join().unwrap()?;
        b.join().unwrap()?;
        Ok(())
    })?;

    assert_eq!(counter.load(Ordering::Relaxed), 20_000);
    Ok(())
}

#[test]
fn test_named_lock_blocks_other_handle_until_released() -> ShmResult<()> {
    let key = tempfile::NamedTempFile::new()?;
    let owner = Lock::named(key.path(), SegmentRole::Owner)?;
    let attached = Lock::named(key.path(), SegmentRole::Attach)?;

    let guard = owner.lock()?;
    let acquired_at = std::thread::scope(|s| {
        let waiter = s.spawn(|| {
            let _g = attached.lock().unwrap();
            Instant::now()
        });
        std::thread::sleep(Duration::from_millis(50));
        let released_at = Instant::now();
        drop(guard);
        let acquired_at = waiter.join().unwrap();
        assert!(acquired_at >= released_at);
        acquired_at
    });
    assert!(acquired_at.elapsed() < Duration::from_secs(5));
    Ok(())
}

// ─── CountingSignal ─────────────────────────────────────────────────

#[test]
fn test_signal_counts_posts() {
    let sig = CountingSignal::new();
    for _ in 0..3 {
        sig.post();
    }
    assert_eq!(sig.value(), 3);
    sig.wait();
    assert!(sig.timed_wait(10));
    assert!(sig.try_wait());
    assert!(!sig.try_wait());
}

#[test]
fn test_signal_timed_wait_bound() {
    let sig = CountingSignal::new();
    let start = Instant::now();
    assert!(!sig.timed_wait(100));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
}

#[test]
fn test_named_signal_crosses_handles() -> ShmResult<()> {
    let name = unique_sem_name("cross");
    let owner = Arc::new(CountingSignal::named(&name, 0, SegmentRole::Owner)?);
    let attached = CountingSignal::named(&name, 0, SegmentRole::Attach)?;

    let waiter = {
        let owner = Arc::clone(&owner);
        std::thread::spawn(move || owner.timed_wait(5_000))
    };
    std::thread::sleep(Duration::from_millis(20));
    attached.post();
    assert!(waiter.join().unwrap(), "owner must observe the attached post");
    assert!(!attached.timed_wait(20));
    Ok(())
}

#[test]
fn test_named_signal_owner_drop_unlinks() -> ShmResult<()> {
    let name = unique_sem_name("unlink");
    let owner = CountingSignal::named(&name, 0, SegmentRole::Owner)?;
    drop(owner);
    assert!(CountingSignal::named(&name, 0, SegmentRole::Attach).is_err());
    Ok(())
}
