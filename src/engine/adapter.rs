//! Engine worker-thread lifecycle controller.
//!
//! [`EngineAdapter`] owns exactly one worker thread per instance. The thread
//! runs the blocking [`EngineLoop`] against a fresh stream bridge bound to
//! the adapter's [`CommandQueue`] and [`LineSink`]. Lifecycle transitions
//! (`Idle → Running → Stopping → Stopped`) are guarded by atomic
//! compare-and-swap so double start and double stop are races-free no-ops,
//! and shutdown waits on the worker for a bounded interval before detaching
//! it.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::bridge::{CommandReader, EngineLoop, LineSink, LineWriter};
use crate::engine::queue::CommandQueue;

/// Bound on waiting for the worker to exit during [`EngineAdapter::stop`].
///
/// A worker still running past this deadline is detached rather than joined,
/// trading a bounded leak for caller responsiveness.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

/// Adapter lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterState {
    /// Constructed, worker not yet spawned.
    Idle = 0,
    /// Worker thread running the engine loop.
    Running = 1,
    /// Stop initiated, waiting for the worker to exit.
    Stopping = 2,
    /// Worker joined or detached; the adapter is spent.
    Stopped = 3,
}

impl AdapterState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Hosts one blocking engine loop on a dedicated worker thread.
///
/// All public operations are safe to call from any thread at any point in
/// the lifecycle: inapplicable calls (`start` twice, `send_command` before
/// start or after stop, `stop` twice) are silent no-ops, never errors. The
/// controller tracks liveness only; engine-internal failures never surface
/// through this API.
pub struct EngineAdapter {
    queue: Arc<CommandQueue>,
    state: AtomicU8,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Engine loop and sink held until `start` moves them onto the worker.
    engine: Option<Box<dyn EngineLoop>>,
    sink: Option<Arc<dyn LineSink>>,
    worker: Option<JoinHandle<()>>,
    done_rx: Option<mpsc::Receiver<()>>,
}

impl EngineAdapter {
    /// Create an adapter that will host `engine`, forwarding each completed
    /// output line to `sink`.
    ///
    /// The sink is invoked on the worker thread; consumers needing async
    /// delivery should bridge through a
    /// [`LineChannel`](crate::engine::channel::LineChannel).
    #[must_use]
    pub fn new(engine: impl EngineLoop + 'static, sink: Arc<dyn LineSink>) -> Self {
        Self {
            queue: Arc::new(CommandQueue::new()),
            state: AtomicU8::new(AdapterState::Idle as u8),
            inner: Mutex::new(Inner {
                engine: Some(Box::new(engine)),
                sink: Some(sink),
                worker: None,
                done_rx: None,
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Spawn the worker thread and start the engine loop. Idempotent.
    ///
    /// The worker builds a fresh [`CommandReader`]/[`LineWriter`] pair, runs
    /// the engine loop to completion, flushes any partial output line, and
    /// closes the command queue on exit (the close guards against callers
    /// that never call [`stop`](Self::stop)).
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(
                AdapterState::Idle as u8,
                AdapterState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        let mut inner = self.lock_inner();
        let (Some(engine), Some(sink)) = (inner.engine.take(), inner.sink.take()) else {
            // Unreachable past the CAS; keep the adapter inert if it happens.
            self.state
                .store(AdapterState::Stopped as u8, Ordering::SeqCst);
            return;
        };

        let queue = Arc::clone(&self.queue);
        let (done_tx, done_rx) = mpsc::channel();

        let spawned = std::thread::Builder::new()
            .name("engine-worker".into())
            .spawn(move || {
                let mut input = CommandReader::new(Arc::clone(&queue));
                let mut output = LineWriter::new(sink);
                engine.run(&mut input, &mut output);
                let _ = output.flush();
                queue.close();
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                inner.worker = Some(handle);
                inner.done_rx = Some(done_rx);
                debug!("engine worker started");
            }
            Err(err) => {
                warn!(%err, "failed to spawn engine worker");
                self.queue.close();
                self.state
                    .store(AdapterState::Stopped as u8, Ordering::SeqCst);
            }
        }
    }

    /// Enqueue one command line for the engine.
    ///
    /// Silently ignored when `text` is blank or the adapter is not running:
    /// pre-start and post-stop sends are safe by construction since callers
    /// race with lifecycle transitions. The push happens under the same
    /// guard [`stop`](Self::stop) serializes on, so a stop never interleaves
    /// with a command mid-enqueue.
    pub fn send_command(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self.state() != AdapterState::Running {
            return;
        }
        let inner = self.lock_inner();
        self.queue.push(text.to_owned());
        drop(inner);
    }

    /// Stop the engine and tear down the worker thread. Idempotent, bounded.
    ///
    /// Pushes the graceful termination pair (`stop`, then `quit`) and closes
    /// the queue, guaranteeing the input bridge eventually reports EOF even
    /// if the loop never reads the `quit`. Then waits up to [`SHUTDOWN_WAIT`]
    /// for the worker: joins it when it finishes in time, otherwise detaches
    /// it and returns.
    ///
    /// Detaching abandons the thread unobserved; whether the process can
    /// safely exit while a detached worker still runs is engine-dependent and
    /// deliberately not resolved here.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(
                AdapterState::Running as u8,
                AdapterState::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        let (worker, done_rx) = {
            let mut inner = self.lock_inner();
            self.queue.push("stop".to_owned());
            self.queue.push("quit".to_owned());
            self.queue.close();
            (inner.worker.take(), inner.done_rx.take())
        };

        let finished = done_rx
            .as_ref()
            .is_some_and(|rx| rx.recv_timeout(SHUTDOWN_WAIT).is_ok());

        match worker {
            Some(handle) if finished => {
                if handle.join().is_err() {
                    warn!("engine worker panicked before exit");
                }
                debug!("engine worker joined");
            }
            Some(handle) => {
                // Deadline missed: abandon the join so the caller is never
                // blocked on an unresponsive engine.
                warn!(wait = ?SHUTDOWN_WAIT, "engine worker unresponsive, detaching");
                drop(handle);
            }
            None => {}
        }

        self.state
            .store(AdapterState::Stopped as u8, Ordering::SeqCst);
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
