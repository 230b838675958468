//! Scripted session runner.
//!
//! Drives one [`EngineAdapter`] through a multi-step protocol exchange:
//! initiation handshake, configuration, readiness synchronization, then a
//! cyclic iteration loop submitting position + search-limit directives and
//! awaiting completion lines under per-step timeouts. Every bounded wait is
//! raced against the run's cancellation token, so an external
//! [`stop`](SessionRunner::stop) interrupts the in-flight wait instead of
//! waiting for the next natural check point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::adapter::EngineAdapter;
use crate::engine::bridge::{EngineLoop, LineSink};
use crate::engine::channel::LineChannel;
use crate::session::config::SessionConfig;
use crate::session::event::{RunSummary, SessionEvent};
use crate::session::protocol::{self, Score};

/// Outcome of one bounded wait for a recognized response prefix.
enum WaitOutcome {
    /// The expected line arrived; carries the full line text.
    Matched(String),
    /// The bound elapsed without the expected line.
    TimedOut,
    /// The run's stop token fired mid-wait.
    Cancelled,
    /// The line channel finished (engine output ended).
    Closed,
}

/// How the protocol exchange ended, before shutdown.
enum DriveOutcome {
    /// The iteration loop ran to its cap.
    Completed,
    /// An external stop request interrupted the run.
    Stopped,
    /// Protocol desynchronization; the message describes the failed step.
    Fatal(String),
}

/// Per-iteration transcript of intervening output lines.
#[derive(Default)]
struct Transcript {
    lines: Vec<String>,
    /// Most recent typed score observed; later lines win.
    score: Option<Score>,
}

impl Transcript {
    fn observe(&mut self, line: &str) {
        if let Some(score) = protocol::parse_score(line) {
            self.score = Some(score);
        }
        self.lines.push(line.to_owned());
    }
}

/// Orchestrates one scripted exchange against one adapter instance.
///
/// A runner is single-use: [`run`](Self::run) drives the adapter from start
/// to shutdown and always terminates with a
/// [`Finished`](SessionEvent::Finished) event carrying the summary, on
/// normal completion, fatal error, and external stop alike.
pub struct SessionRunner {
    adapter: Arc<EngineAdapter>,
    lines: Arc<LineChannel>,
    config: SessionConfig,
    run_id: String,
    stop: CancellationToken,
}

impl SessionRunner {
    /// Build a runner over an adapter whose sink feeds `lines`.
    ///
    /// The caller is responsible for having wired the adapter's [`LineSink`]
    /// to push into `lines`; [`with_engine`](Self::with_engine) does that
    /// wiring for the common single-consumer case.
    #[must_use]
    pub fn new(
        adapter: Arc<EngineAdapter>,
        lines: Arc<LineChannel>,
        config: SessionConfig,
    ) -> Self {
        Self {
            adapter,
            lines,
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
            stop: CancellationToken::new(),
        }
    }

    /// Construct the adapter, channel, and runner in one step.
    #[must_use]
    pub fn with_engine(engine: impl EngineLoop + 'static, config: SessionConfig) -> Self {
        let lines = Arc::new(LineChannel::new());
        let sink: Arc<dyn LineSink> = lines.clone();
        let adapter = Arc::new(EngineAdapter::new(engine, sink));
        Self::new(adapter, lines, config)
    }

    /// Identifier tagging this run's events and logs.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The adapter instance this runner drives.
    #[must_use]
    pub fn adapter(&self) -> &Arc<EngineAdapter> {
        &self.adapter
    }

    /// Request a cooperative stop. Fire-and-forget, callable from any thread.
    ///
    /// Cancels the wait currently in flight and sends a cancellation
    /// directive to the adapter so a pending search unblocks rather than
    /// running out its clock.
    pub fn stop(&self) {
        self.stop.cancel();
        self.adapter.send_command(protocol::CANCEL_DIRECTIVE);
    }

    /// Drive the session to completion, delivering events to `events`.
    ///
    /// Returns the accumulated summary, identical to the one carried by the
    /// final [`Finished`](SessionEvent::Finished) event.
    pub async fn run(&self, events: mpsc::Sender<SessionEvent>) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        info!(
            run_id = %self.run_id,
            positions = self.config.positions.len(),
            max_iterations = self.config.max_iterations,
            "session starting"
        );
        self.emit(
            &events,
            SessionEvent::Started {
                run_id: self.run_id.clone(),
                positions: self.config.positions.len(),
                max_iterations: self.config.max_iterations,
            },
        )
        .await;

        self.adapter.start();

        match self.drive(&events, &mut summary).await {
            DriveOutcome::Completed => {
                debug!(run_id = %self.run_id, "iteration loop completed");
            }
            DriveOutcome::Stopped => {
                info!(run_id = %self.run_id, "session stopped on request");
                self.emit(&events, SessionEvent::Stopped).await;
            }
            DriveOutcome::Fatal(message) => {
                warn!(run_id = %self.run_id, error = %message, "session failed");
                summary.errors += 1;
                self.emit(&events, SessionEvent::Error { message }).await;
            }
        }

        // Shutdown is unconditional. The adapter's bounded join runs off the
        // async runtime so an unresponsive engine cannot stall other tasks.
        let adapter = Arc::clone(&self.adapter);
        if tokio::task::spawn_blocking(move || adapter.stop()).await.is_err() {
            warn!(run_id = %self.run_id, "adapter stop task panicked");
        }
        self.lines.finish();

        summary.elapsed_ms = millis(started.elapsed());
        self.emit(&events, SessionEvent::Finished { summary }).await;
        info!(
            run_id = %self.run_id,
            attempted = summary.attempted,
            completed = summary.completed,
            timeouts = summary.timeouts,
            errors = summary.errors,
            "session finished"
        );
        summary
    }

    /// The protocol exchange: handshake, configure, synchronize, iterate.
    #[allow(clippy::too_many_lines)] // One linear state machine; splitting would obscure the step order.
    async fn drive(
        &self,
        events: &mpsc::Sender<SessionEvent>,
        summary: &mut RunSummary,
    ) -> DriveOutcome {
        // ── Handshake ────────────────────────────────────
        self.adapter.send_command(protocol::INIT_DIRECTIVE);
        match self
            .await_prefix(protocol::INIT_ACK, self.config.handshake_timeout(), events, None)
            .await
        {
            WaitOutcome::Matched(_) => debug!(run_id = %self.run_id, "handshake acknowledged"),
            WaitOutcome::TimedOut => {
                return DriveOutcome::Fatal(format!(
                    "handshake timed out: '{}' not received within {:?}",
                    protocol::INIT_ACK,
                    self.config.handshake_timeout()
                ));
            }
            WaitOutcome::Cancelled => return DriveOutcome::Stopped,
            WaitOutcome::Closed => {
                return DriveOutcome::Fatal("engine output ended during handshake".into());
            }
        }

        // ── Configure ────────────────────────────────────
        for directive in &self.config.setup {
            self.adapter.send_command(directive);
        }

        // ── Synchronize ──────────────────────────────────
        if let Some(outcome) = self.synchronize(events).await {
            return outcome;
        }

        // ── Iterate ──────────────────────────────────────
        let mut cursor = 0usize;
        loop {
            if self.stop.is_cancelled() {
                return DriveOutcome::Stopped;
            }
            if let Some(cap) = self.config.max_iterations {
                if summary.attempted >= cap {
                    break;
                }
            }

            let index = summary.attempted;
            let position = &self.config.positions[cursor % self.config.positions.len()];
            summary.attempted += 1;
            self.emit(
                events,
                SessionEvent::IterationStarted {
                    index,
                    position: position.clone(),
                },
            )
            .await;

            if self.config.resync_each_iteration {
                if let Some(outcome) = self.synchronize(events).await {
                    return outcome;
                }
            }

            self.adapter.send_command(position);
            self.adapter.send_command(&self.config.search_limit);

            let step_started = Instant::now();
            let mut transcript = Transcript::default();
            match self
                .await_prefix(
                    protocol::COMPLETION_PREFIX,
                    self.config.step_timeout(),
                    events,
                    Some(&mut transcript),
                )
                .await
            {
                WaitOutcome::Matched(line) => {
                    summary.completed += 1;
                    let best_move = protocol::parse_best_move(&line).unwrap_or_default().to_owned();
                    debug!(
                        run_id = %self.run_id,
                        index,
                        best_move = %best_move,
                        lines = transcript.lines.len(),
                        "iteration completed"
                    );
                    self.emit(
                        events,
                        SessionEvent::IterationCompleted {
                            index,
                            best_move,
                            score: transcript.score,
                            elapsed_ms: millis(step_started.elapsed()),
                        },
                    )
                    .await;
                }
                WaitOutcome::TimedOut => {
                    summary.timeouts += 1;
                    warn!(run_id = %self.run_id, index, "iteration timed out");
                    self.emit(
                        events,
                        SessionEvent::TimedOut {
                            index,
                            position: position.clone(),
                            elapsed_ms: millis(step_started.elapsed()),
                        },
                    )
                    .await;

                    // Cancel the in-flight search and give the engine a
                    // grace window to flush its completion line.
                    self.adapter.send_command(protocol::CANCEL_DIRECTIVE);
                    match self
                        .await_prefix(
                            protocol::COMPLETION_PREFIX,
                            self.config.grace_timeout(),
                            events,
                            Some(&mut transcript),
                        )
                        .await
                    {
                        WaitOutcome::Matched(_) => {
                            debug!(run_id = %self.run_id, index, "engine recovered after cancel");
                        }
                        WaitOutcome::TimedOut => {
                            if self.config.fatal_timeouts {
                                return DriveOutcome::Fatal(format!(
                                    "engine unresponsive after cancellation (grace {:?})",
                                    self.config.grace_timeout()
                                ));
                            }
                            warn!(run_id = %self.run_id, index, "grace window elapsed, continuing");
                        }
                        WaitOutcome::Cancelled => return DriveOutcome::Stopped,
                        WaitOutcome::Closed => {
                            return DriveOutcome::Fatal(
                                "engine output ended mid-iteration".into(),
                            );
                        }
                    }
                }
                WaitOutcome::Cancelled => return DriveOutcome::Stopped,
                WaitOutcome::Closed => {
                    return DriveOutcome::Fatal("engine output ended mid-iteration".into());
                }
            }

            cursor += 1;
            if let Some(delay) = self.config.iteration_delay() {
                // The pause must not outlive a stop request.
                tokio::select! {
                    biased;
                    () = self.stop.cancelled() => return DriveOutcome::Stopped,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }

        DriveOutcome::Completed
    }

    /// Readiness exchange: probe, then await the acknowledgment.
    ///
    /// Returns `None` on success, or the terminal outcome to propagate.
    async fn synchronize(&self, events: &mpsc::Sender<SessionEvent>) -> Option<DriveOutcome> {
        self.adapter.send_command(protocol::READY_DIRECTIVE);
        match self
            .await_prefix(protocol::READY_ACK, self.config.handshake_timeout(), events, None)
            .await
        {
            WaitOutcome::Matched(_) => None,
            WaitOutcome::TimedOut => Some(DriveOutcome::Fatal(format!(
                "readiness probe timed out: '{}' not received within {:?}",
                protocol::READY_ACK,
                self.config.handshake_timeout()
            ))),
            WaitOutcome::Cancelled => Some(DriveOutcome::Stopped),
            WaitOutcome::Closed => Some(DriveOutcome::Fatal(
                "engine output ended during readiness probe".into(),
            )),
        }
    }

    /// Wait for a line whose first field matches `token`, bounded by
    /// `timeout` and raced against the stop token.
    ///
    /// Every line received while waiting is forwarded as
    /// [`OutputLine`](SessionEvent::OutputLine); intervening lines are also
    /// recorded into `transcript` when one is supplied.
    async fn await_prefix(
        &self,
        token: &str,
        timeout: Duration,
        events: &mpsc::Sender<SessionEvent>,
        mut transcript: Option<&mut Transcript>,
    ) -> WaitOutcome {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());

            tokio::select! {
                biased;

                () = self.stop.cancelled() => return WaitOutcome::Cancelled,

                next = tokio::time::timeout(remaining, self.lines.next()) => match next {
                    Err(_elapsed) => return WaitOutcome::TimedOut,
                    Ok(None) => return WaitOutcome::Closed,
                    Ok(Some(line)) => {
                        self.emit(events, SessionEvent::OutputLine { line: line.clone() }).await;
                        if protocol::starts_with_token(&line, token) {
                            return WaitOutcome::Matched(line);
                        }
                        if let Some(t) = transcript.as_deref_mut() {
                            t.observe(&line);
                        }
                    }
                },
            }
        }
    }

    /// Deliver one event, ignoring a closed sink.
    async fn emit(&self, events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
        if events.send(event).await.is_err() {
            debug!(run_id = %self.run_id, "event sink closed, dropping event");
        }
    }
}

/// Clamp a duration to whole milliseconds for event payloads.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
