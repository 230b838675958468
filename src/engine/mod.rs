//! In-process engine hosting.
//!
//! This module owns everything on the engine side of the harness: the
//! blocking command queue, the stream bridge the engine loop reads from and
//! writes to, the worker-thread lifecycle controller, and the line channel
//! that carries engine output to async consumers.
//!
//! Submodules:
//! - `queue`: closable blocking FIFO of command lines.
//! - `bridge`: `std::io` adapters over the queue plus the [`LineSink`](bridge::LineSink)
//!   and [`EngineLoop`](bridge::EngineLoop) capability seams.
//! - `adapter`: idempotent start/send/stop lifecycle around one worker thread.
//! - `channel`: sync-push / async-pull hand-off of output lines.
//! - `stub`: scripted engine used by the demo binary and the test-suite.

pub mod adapter;
pub mod bridge;
pub mod channel;
pub mod queue;
pub mod stub;
