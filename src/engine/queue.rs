//! Blocking command queue shared between callers and the engine thread.
//!
//! The queue is the single hand-off point between the async side of the
//! adapter and the dedicated engine worker thread: callers `push` command
//! lines from any thread, the worker's input bridge `pop`s them one at a
//! time, blocking until work arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

/// Thread-safe FIFO of command lines with close semantics.
///
/// - [`push`](Self::push) adds work; silently dropped once closed.
/// - [`pop`](Self::pop) blocks until an item is available or the queue is
///   closed, returning `None` on closed-and-empty (the EOF signal).
/// - [`close`](Self::close) is idempotent, wakes every blocked waiter, and
///   prevents future pushes.
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    closed: bool,
}

impl CommandQueue {
    /// Create an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command line. No-op after [`close`](Self::close).
    ///
    /// Tolerating late sends instead of erroring makes caller/shutdown races
    /// safe by construction: a command pushed after shutdown began is simply
    /// never delivered.
    pub fn push(&self, line: String) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.items.push_back(line);
        drop(state);
        self.available.notify_one();
    }

    /// Dequeue the next command line, blocking until one is available.
    ///
    /// Returns `None` once the queue is closed and drained. A concurrent
    /// [`close`](Self::close) wakes every blocked `pop`, so this can never
    /// deadlock against shutdown.
    #[must_use]
    pub fn pop(&self) -> Option<String> {
        let mut state = self.lock_state();
        while !state.closed && state.items.is_empty() {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.items.pop_front()
    }

    /// Close the queue: wake all waiters and reject future pushes.
    ///
    /// Idempotent. Items already enqueued remain poppable until drained.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    /// Whether the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Acquire the state lock, recovering from poisoning.
    ///
    /// A panic on another thread mid-mutation leaves the queue in a
    /// consistent state (single-field pushes/pops), so the poisoned guard is
    /// safe to reuse.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
