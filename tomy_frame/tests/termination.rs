//! SIGTERM handling. Kept in its own test binary because the pending
//! signal is process-wide.

mod common;

use common::Keys;
use nix::sys::signal::{Signal, raise};
use std::time::{Duration, Instant};
use tomy_frame::{
    MultiThreadedProcessContext, RunResult, SegmentRole, WorkerContext, check_signal,
    install_signal_handlers,
};

#[test]
fn test_sigterm_ends_log_retrieval_and_run() {
    let keys = Keys::new();
    let monitor = keys.context(SegmentRole::Owner);
    let daemon = MultiThreadedProcessContext::new(keys.context(SegmentRole::Attach));

    daemon
        .attach("ticker", |ctx: &WorkerContext| -> RunResult {
            while !ctx.is_stopping() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        })
        .unwrap();

    install_signal_handlers().unwrap();
    raise(Signal::SIGTERM).unwrap();
    assert_eq!(check_signal(), Some(Signal::SIGTERM));
    assert_eq!(monitor.check_signal(), Some(Signal::SIGTERM));

    tomy_frame::log_write!(daemon.process(), "last words").unwrap();
    let record = monitor.get_log().unwrap().unwrap();
    assert_eq!(record.as_str(), "last words");
    monitor.release_log(record);

    let start = Instant::now();
    assert!(monitor.get_log().unwrap().is_none());
    assert!(start.elapsed() < Duration::from_secs(3));

    assert_eq!(daemon.run(), 1);
}
