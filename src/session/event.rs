//! Events emitted by the session runner into the caller's event channel.

use serde::Serialize;

use crate::session::protocol::Score;

/// Events produced by a session run, in strict chronological order.
///
/// Delivered to exactly one caller-supplied sink; there is no buffering or
/// replay beyond in-order delivery to that sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The run began with the resolved configuration.
    Started {
        /// Unique identifier tagging this run's events and logs.
        run_id: String,
        /// Number of position specs in the cyclic rotation.
        positions: usize,
        /// Iteration cap; `None` means unbounded.
        max_iterations: Option<u32>,
    },
    /// One raw engine output line, forwarded as observed.
    OutputLine {
        /// The line text, terminator stripped.
        line: String,
    },
    /// An iteration began for the given position.
    IterationStarted {
        /// Zero-based iteration index.
        index: u32,
        /// Position directive submitted this iteration.
        position: String,
    },
    /// An iteration finished with a completion line.
    IterationCompleted {
        /// Zero-based iteration index.
        index: u32,
        /// Result token from the completion line.
        best_move: String,
        /// Most recent typed score observed in this iteration's transcript.
        score: Option<Score>,
        /// Wall-clock time from request submission to completion.
        elapsed_ms: u64,
    },
    /// The bounded wait for a completion line elapsed.
    TimedOut {
        /// Zero-based iteration index.
        index: u32,
        /// Position directive that was being searched.
        position: String,
        /// Wall-clock time waited before giving up.
        elapsed_ms: u64,
    },
    /// The run was interrupted by an external stop request.
    Stopped,
    /// A fatal protocol failure ended the run early.
    Error {
        /// Human-readable failure description.
        message: String,
    },
    /// The run terminated; always the final event.
    Finished {
        /// Accumulated run statistics.
        summary: RunSummary,
    },
}

/// Aggregate statistics for one session run.
///
/// Computed once at run completion and consistent with the
/// [`Finished`](SessionEvent::Finished) event carrying it. Callers
/// distinguish success from failure via the error and timeout counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Iterations started.
    pub attempted: u32,
    /// Iterations that observed a completion line in time.
    pub completed: u32,
    /// Bounded waits that elapsed without the expected response.
    pub timeouts: u32,
    /// Fatal failures (protocol desynchronization).
    pub errors: u32,
    /// Total wall-clock duration of the run.
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Whether the run finished without timeouts or fatal errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.timeouts == 0 && self.errors == 0
    }
}
