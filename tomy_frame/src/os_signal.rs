//! Polling for process termination requests
//!
//! Handlers only record the signal number in an atomic. Blocking loops
//! (`ProcessContext::get_log`, `MultiThreadedProcessContext::run`) wake in
//! short slices and poll [`check_signal`].

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicI32, Ordering};

static PENDING: AtomicI32 = AtomicI32::new(0);

const HANDLED: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

extern "C" fn record_signal(signo: libc::c_int) {
    PENDING.store(signo, Ordering::SeqCst);
}

/// Route SIGINT, SIGTERM and SIGHUP to the pending-signal slot.
pub fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(record_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in HANDLED {
        // Safety: the handler only performs an atomic store.
        unsafe { sigaction(signal, &action)? };
    }
    tracing::debug!("Signal handlers installed");
    Ok(())
}

/// Last handled signal received, if any.
pub fn check_signal() -> Option<Signal> {
    match PENDING.load(Ordering::SeqCst) {
        0 => None,
        signo => Signal::try_from(signo).ok(),
    }
}

/// Forget the pending signal.
pub fn clear_signal() {
    PENDING.store(0, Ordering::SeqCst);
}

/// True for signals that request the process to exit.
pub fn is_termination(signal: Signal) -> bool {
    matches!(signal, Signal::SIGINT | Signal::SIGTERM)
}

/// Pending termination request, if any.
pub fn termination_requested() -> Option<Signal> {
    check_signal().filter(|signal| is_termination(*signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hangup_is_recorded_but_not_termination() {
        install_signal_handlers().unwrap();
        nix::sys::signal::raise(Signal::SIGHUP).unwrap();

        assert_eq!(check_signal(), Some(Signal::SIGHUP));
        assert_eq!(termination_requested(), None);
        clear_signal();
        assert_eq!(check_signal(), None);
    }

    #[test]
    fn test_termination_classification() {
        assert!(is_termination(Signal::SIGINT));
        assert!(is_termination(Signal::SIGTERM));
        assert!(!is_termination(Signal::SIGHUP));
    }
}
