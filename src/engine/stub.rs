//! Deterministic scripted engine for the demo binary and the test-suite.
//!
//! [`ScriptedEngine`] speaks just enough UCI to exercise the harness end to
//! end: identification handshake, readiness probes, and a simulated search
//! with a configurable delay and a fixed best-move rotation. Real integrations
//! supply their own [`EngineLoop`] (typically an FFI shim over an embedded
//! engine build); nothing in the adapter or the session runner depends on
//! this implementation.

use std::io::{BufRead, Write};
use std::time::Duration;

use crate::engine::bridge::EngineLoop;

/// Perft node counts from the starting position, indexed by depth.
const PERFT_NODES: [u64; 6] = [1, 20, 400, 8_902, 197_281, 4_865_609];

/// Scripted UCI engine with a fixed best-move rotation.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    moves: Vec<String>,
    search_delay: Duration,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            moves: ["e2e4", "d2d4", "g1f3", "c2c4"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            search_delay: Duration::from_millis(10),
        }
    }
}

impl ScriptedEngine {
    /// Create an engine with the default move rotation and search delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cyclic best-move rotation. Empty input is ignored.
    #[must_use]
    pub fn with_moves(mut self, moves: Vec<String>) -> Self {
        if !moves.is_empty() {
            self.moves = moves;
        }
        self
    }

    /// Set the simulated search time per `go` request.
    #[must_use]
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    fn answer_go(
        &self,
        args: &str,
        move_index: usize,
        output: &mut dyn Write,
    ) {
        if let Some(depth) = perft_depth(args) {
            let nodes = PERFT_NODES
                .get(depth)
                .copied()
                .unwrap_or(PERFT_NODES[PERFT_NODES.len() - 1]);
            let _ = writeln!(output, "Nodes searched: {nodes}");
            return;
        }

        // Simulated search: the delay stands in for real computation so
        // timeout paths in the harness can be exercised deterministically.
        std::thread::sleep(self.search_delay);

        let best = &self.moves[move_index % self.moves.len()];
        let score = 13 + i64::try_from(move_index).unwrap_or(0) * 4;
        let _ = writeln!(
            output,
            "info depth 1 seldepth 1 score cp {score} nodes 20 nps 20000 pv {best}"
        );
        let _ = writeln!(
            output,
            "info depth 8 seldepth 12 score cp {score} nodes 14329 nps 286580 pv {best}"
        );
        let _ = writeln!(output, "bestmove {best}");
    }
}

impl EngineLoop for ScriptedEngine {
    fn run(self: Box<Self>, input: &mut dyn BufRead, output: &mut dyn Write) {
        // Identity banner precedes any command handling, like a real engine.
        let _ = writeln!(output, "ucibench scripted engine");

        let mut move_index = 0usize;
        let mut line = String::new();

        loop {
            line.clear();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            let command = line.trim();
            let (head, rest) = match command.split_once(char::is_whitespace) {
                Some((head, rest)) => (head, rest.trim()),
                None => (command, ""),
            };

            match head {
                "uci" => {
                    let _ = writeln!(output, "id name ucibench-scripted");
                    let _ = writeln!(output, "id author ucibench contributors");
                    let _ = writeln!(output, "option name Hash type spin default 16 min 1 max 1024");
                    let _ = writeln!(output, "uciok");
                }
                "isready" => {
                    let _ = writeln!(output, "readyok");
                }
                "go" => {
                    self.answer_go(rest, move_index, output);
                    move_index += 1;
                }
                "quit" => break,
                // Accepted silently: state-changing directives with no ack.
                "setoption" | "position" | "ucinewgame" | "stop" | "" => {}
                other => {
                    let _ = writeln!(output, "info string unknown command {other}");
                }
            }
        }
    }
}

/// Extract the depth argument of a `go perft <depth>` request.
fn perft_depth(args: &str) -> Option<usize> {
    let mut fields = args.split_whitespace();
    if fields.next() != Some("perft") {
        return None;
    }
    fields.next()?.parse().ok()
}
