//! Sync-push / async-pull hand-off for engine output lines.
//!
//! The engine worker thread produces lines through a synchronous callback;
//! the session runner consumes them cooperatively. [`LineChannel`] bridges
//! the two sides: `push` is plain-sync and callable from the worker thread,
//! `next` suspends the async consumer until a line arrives or the channel is
//! finished.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// Ordered line hand-off with buffering, FIFO waiter fairness, cancellation,
/// and idempotent shutdown.
///
/// Lines are delivered to consumers in exact production order. A suspended
/// [`next`](Self::next) that is dropped (e.g. it lost a `select!` race) is
/// removed from the waiter set: a later `push` skips the dead waiter and
/// hands the line to the next live one, or buffers it.
#[derive(Debug, Default)]
pub struct LineChannel {
    state: Mutex<ChannelState>,
}

#[derive(Debug, Default)]
struct ChannelState {
    buffered: VecDeque<String>,
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
    finished: bool,
}

impl LineChannel {
    /// Create an open, empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one line: directly to the oldest live waiter, else buffer it.
    ///
    /// Callable from any thread; lines pushed after [`finish`](Self::finish)
    /// are dropped.
    pub fn push(&self, line: String) {
        let mut state = self.lock_state();
        if state.finished {
            return;
        }
        let mut line = line;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Some(line)) {
                Ok(()) => return,
                // Waiter was cancelled; reclaim the line and try the next.
                Err(returned) => line = returned.unwrap_or_default(),
            }
        }
        state.buffered.push_back(line);
    }

    /// Await the next line; `None` means the channel is finished.
    ///
    /// Returns a buffered line immediately when one is present, otherwise
    /// suspends until a `push` or [`finish`](Self::finish) resumes this
    /// specific waiter. Dropping the returned future cancels the wait
    /// without leaking a suspended waiter.
    pub async fn next(&self) -> Option<String> {
        let receiver = {
            let mut state = self.lock_state();
            if let Some(line) = state.buffered.pop_front() {
                return Some(line);
            }
            if state.finished {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };
        receiver.await.unwrap_or(None)
    }

    /// Close the channel: resume all waiters with `None`, drop buffered
    /// lines, and make every subsequent [`next`](Self::next) resolve
    /// immediately to `None`. Idempotent.
    pub fn finish(&self) {
        let waiters = {
            let mut state = self.lock_state();
            state.finished = true;
            state.buffered.clear();
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(None);
        }
    }

    /// Whether [`finish`](Self::finish) has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock_state().finished
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl crate::engine::bridge::LineSink for LineChannel {
    fn accept(&self, line: &str) {
        self.push(line.to_owned());
    }
}
