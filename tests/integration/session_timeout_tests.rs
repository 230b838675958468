//! Integration tests for the timeout and grace-recovery paths.

use std::time::Duration;

use serial_test::serial;

use ucibench::engine::stub::ScriptedEngine;
use ucibench::session::config::SessionConfig;
use ucibench::session::event::SessionEvent;

use super::test_helpers::{mini_engine, run_session, GoBehavior};

fn timeout_config(step_ms: u64, grace_ms: u64, fatal: bool, cap: u32) -> SessionConfig {
    SessionConfig {
        positions: vec!["position startpos".into()],
        search_limit: "go movetime 10".into(),
        max_iterations: Some(cap),
        step_timeout_ms: step_ms,
        grace_timeout_ms: grace_ms,
        fatal_timeouts: fatal,
        ..SessionConfig::default()
    }
}

#[tokio::test]
#[serial]
async fn slow_engine_times_out_then_recovers_in_the_grace_window() {
    // The engine answers every search, but slower than the step timeout.
    let engine = ScriptedEngine::new().with_search_delay(Duration::from_millis(300));
    let config = timeout_config(50, 2000, false, 2);
    let (events, summary) = run_session(engine, config).await;

    let timed_out = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::TimedOut { .. }))
        .count();
    assert_eq!(timed_out, 2, "every iteration should time out");
    assert!(
        !events.iter().any(|e| matches!(e, SessionEvent::Error { .. })),
        "grace recovery must not escalate to an error"
    );
    assert!(matches!(events.last(), Some(SessionEvent::Finished { .. })));

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.timeouts, 2);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn unanswered_search_with_fatal_timeouts_ends_the_run() {
    let config = timeout_config(50, 50, true, 5);
    let (events, summary) = run_session(mini_engine(GoBehavior::Silent), config).await;

    let timed_out_index = events
        .iter()
        .position(|e| matches!(e, SessionEvent::TimedOut { .. }));
    let error_index = events
        .iter()
        .position(|e| matches!(e, SessionEvent::Error { .. }));
    assert!(
        matches!((timed_out_index, error_index), (Some(t), Some(e)) if t < e),
        "expected a TimedOut event followed by an Error event"
    );
    assert!(matches!(events.last(), Some(SessionEvent::Finished { .. })));

    // The first iteration's failure aborts the remaining four.
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.timeouts, 1);
    assert_eq!(summary.errors, 1);
}

#[tokio::test]
async fn unanswered_search_without_fatal_timeouts_continues_the_run() {
    let config = timeout_config(50, 50, false, 2);
    let (events, summary) = run_session(mini_engine(GoBehavior::Silent), config).await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.timeouts, 2);
    assert_eq!(summary.errors, 0);
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Error { .. })));
}
