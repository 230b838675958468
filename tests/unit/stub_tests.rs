//! Unit tests for the scripted engine, driven directly through the bridge
//! types without spawning a worker thread.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ucibench::engine::bridge::{EngineLoop, FnSink, LineSink, LineWriter};
use ucibench::engine::stub::ScriptedEngine;
use ucibench::session::protocol;

/// Run the scripted engine over a fixed command script, returning its output.
fn run_script(engine: ScriptedEngine, script: &str) -> Vec<String> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines);
    let sink: Arc<dyn LineSink> = Arc::new(FnSink(move |line: &str| {
        captured.lock().unwrap().push(line.to_owned());
    }));

    let mut input = Cursor::new(script.as_bytes().to_vec());
    let mut output = LineWriter::new(sink);
    Box::new(engine).run(&mut input, &mut output);

    let collected = lines.lock().unwrap().clone();
    collected
}

#[test]
fn handshake_script_ends_with_uciok() {
    let output = run_script(
        ScriptedEngine::new().with_search_delay(Duration::ZERO),
        "uci\nquit\n",
    );

    // Identity banner first, acknowledgment last.
    assert_eq!(output.first().map(String::as_str), Some("ucibench scripted engine"));
    assert_eq!(output.last().map(String::as_str), Some("uciok"));
    assert!(output.iter().any(|l| l.starts_with("id name")));
}

#[test]
fn readiness_probe_is_acknowledged_every_time() {
    let output = run_script(
        ScriptedEngine::new().with_search_delay(Duration::ZERO),
        "isready\nisready\nisready\nquit\n",
    );

    let acks = output.iter().filter(|l| *l == "readyok").count();
    assert_eq!(acks, 3);
}

#[test]
fn search_emits_info_then_bestmove_from_rotation() {
    let output = run_script(
        ScriptedEngine::new()
            .with_search_delay(Duration::ZERO)
            .with_moves(vec!["a2a3".into(), "b2b3".into()]),
        "position startpos\ngo movetime 10\ngo movetime 10\ngo movetime 10\nquit\n",
    );

    let best: Vec<_> = output
        .iter()
        .filter_map(|l| protocol::parse_best_move(l))
        .collect();
    assert_eq!(best, vec!["a2a3", "b2b3", "a2a3"], "rotation must cycle");

    // Every search is preceded by at least one scored info line.
    assert!(output.iter().any(|l| protocol::parse_score(l).is_some()));
}

#[test]
fn perft_request_reports_node_count() {
    let output = run_script(
        ScriptedEngine::new().with_search_delay(Duration::ZERO),
        "go perft 4\nquit\n",
    );

    let nodes: Vec<_> = output
        .iter()
        .filter_map(|l| protocol::parse_node_count(l))
        .collect();
    assert_eq!(nodes, vec![197_281]);
}

#[test]
fn engine_exits_on_end_of_input_without_quit() {
    let output = run_script(
        ScriptedEngine::new().with_search_delay(Duration::ZERO),
        "uci\n",
    );

    assert_eq!(output.last().map(String::as_str), Some("uciok"));
}
