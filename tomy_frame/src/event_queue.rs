//! Blocking FIFO for passing owned items between threads of one process

use parking_lot::Mutex;
use std::collections::VecDeque;
use tomy_shared_memory::CountingSignal;

/// Item type that can stand in for "nothing arrived" on a timed wait.
///
/// [`EventQueue::timed_wait`] returns `T::default()` marked with
/// [`set_timeout`](TimeoutEvent::set_timeout) when the deadline passes;
/// callers check [`is_timeout`](TimeoutEvent::is_timeout) before using the
/// value.
pub trait TimeoutEvent: Default {
    /// Mark this value as a synthesized timeout
    fn set_timeout(&mut self);

    /// True if this value was synthesized by a timed-out wait
    fn is_timeout(&self) -> bool;
}

/// FIFO of owned items paired with a counting signal.
///
/// The signal count always equals the number of queued items, so a waiter
/// that was woken is guaranteed to find an item. Items still queued when
/// the queue is dropped are dropped with it.
pub struct EventQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: CountingSignal,
}

impl<T> EventQueue<T> {
    /// Empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: CountingSignal::new(),
        }
    }

    /// Enqueue `item` and wake one waiter. Never blocks on a consumer.
    pub fn post(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.post();
    }

    /// Block until an item is available and take it.
    pub fn wait(&self) -> T {
        loop {
            self.available.wait();
            if let Some(item) = self.items.lock().pop_front() {
                return item;
            }
        }
    }

    /// Take the front item if one is queued right now.
    pub fn try_take(&self) -> Option<T> {
        if !self.available.try_wait() {
            return None;
        }
        self.items.lock().pop_front()
    }

    /// Racy length snapshot, for diagnostics only.
    pub fn size(&self) -> usize {
        self.items.lock().len()
    }
}

impl<T: TimeoutEvent> EventQueue<T> {
    /// Wait at most `ms` milliseconds for an item.
    ///
    /// On timeout a default item flagged with
    /// [`TimeoutEvent::set_timeout`] is returned instead.
    pub fn timed_wait(&self, ms: u32) -> T {
        if self.available.timed_wait(ms) {
            if let Some(item) = self.items.lock().pop_front() {
                return item;
            }
        }
        let mut timeout = T::default();
        timeout.set_timeout();
        timeout
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
