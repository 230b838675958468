//! Integration tests for cooperative stop.
//!
//! A stop request must interrupt whichever wait is in flight (handshake,
//! completion wait, or inter-iteration delay) and the run must still end
//! with a `Finished` event inside the shutdown bound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_test::serial;
use tokio::sync::mpsc;

use ucibench::engine::stub::ScriptedEngine;
use ucibench::session::config::SessionConfig;
use ucibench::session::event::{RunSummary, SessionEvent};
use ucibench::session::runner::SessionRunner;

/// Drive a run, invoking `stop` on the first event matching `trigger`.
///
/// Returns the collected events, the summary, and the wall-clock time from
/// the stop call to run completion.
async fn run_and_stop_on(
    engine: ScriptedEngine,
    config: SessionConfig,
    trigger: fn(&SessionEvent) -> bool,
) -> (Vec<SessionEvent>, RunSummary, Duration) {
    let runner = Arc::new(SessionRunner::with_engine(engine, config));
    let (event_tx, mut event_rx) = mpsc::channel(256);

    let run = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(event_tx).await })
    };

    let mut events = Vec::new();
    let mut stopped_at: Option<Instant> = None;
    while let Some(event) = event_rx.recv().await {
        let fire = stopped_at.is_none() && trigger(&event);
        events.push(event);
        if fire {
            runner.stop();
            stopped_at = Some(Instant::now());
        }
    }
    let summary = run.await.expect("session run task");
    let elapsed = stopped_at.expect("trigger event never observed").elapsed();
    (events, summary, elapsed)
}

#[tokio::test]
async fn stop_before_the_handshake_ends_the_run_immediately() {
    let runner = Arc::new(SessionRunner::with_engine(
        ScriptedEngine::new(),
        SessionConfig::default(),
    ));
    runner.stop();

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let run = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(event_tx).await })
    };
    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event);
    }
    let summary = run.await.expect("session run task");

    assert!(events.iter().any(|e| matches!(e, SessionEvent::Stopped)));
    assert!(matches!(events.last(), Some(SessionEvent::Finished { .. })));
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
#[serial]
async fn stop_cancels_the_iteration_delay_without_waiting_it_out() {
    let config = SessionConfig {
        positions: vec!["position startpos".into()],
        search_limit: "go movetime 10".into(),
        // Far longer than the assertion bound; stop must cut it short.
        iteration_delay_ms: 60_000,
        ..SessionConfig::default()
    };
    let engine = ScriptedEngine::new().with_search_delay(Duration::from_millis(1));

    let (events, summary, elapsed) = run_and_stop_on(engine, config, |e| {
        matches!(e, SessionEvent::IterationCompleted { .. })
    })
    .await;

    assert!(
        elapsed < Duration::from_secs(3),
        "stop during the delay took {elapsed:?}"
    );
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Stopped)));
    assert!(matches!(events.last(), Some(SessionEvent::Finished { .. })));
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.completed, 1);
}

#[tokio::test]
#[serial]
async fn stop_mid_search_interrupts_the_completion_wait() {
    let config = SessionConfig {
        positions: vec!["position startpos".into()],
        search_limit: "go movetime 10".into(),
        // The wait bound is far beyond the assertion bound; only the stop
        // request can end the iteration early.
        step_timeout_ms: 30_000,
        ..SessionConfig::default()
    };
    // Engine slow enough that the search outlives the whole test.
    let engine = ScriptedEngine::new().with_search_delay(Duration::from_secs(10));

    let (events, summary, elapsed) = run_and_stop_on(engine, config, |e| {
        matches!(e, SessionEvent::IterationStarted { .. })
    })
    .await;

    // The wait is cancelled right away; the unresponsive worker is then
    // detached after the adapter's bounded shutdown wait.
    assert!(
        elapsed < Duration::from_secs(5),
        "stop mid-search took {elapsed:?}"
    );
    assert!(events.iter().any(|e| matches!(e, SessionEvent::Stopped)));
    assert!(matches!(events.last(), Some(SessionEvent::Finished { .. })));
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.errors, 0);
}
