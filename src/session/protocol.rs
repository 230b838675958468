//! UCI wire conventions the session runner sequences on.
//!
//! The engine's command/response vocabulary is opaque to the harness except
//! for a handful of recognized tokens: the initiation and readiness
//! exchanges, the completion line that ends a search, the typed score
//! embedded in `info` lines, and the node-count diagnostic. Everything else
//! passes through verbatim.

use serde::Serialize;

/// Protocol-initiation directive.
pub const INIT_DIRECTIVE: &str = "uci";
/// Acknowledgment ending the initiation exchange.
pub const INIT_ACK: &str = "uciok";
/// Readiness probe directive.
pub const READY_DIRECTIVE: &str = "isready";
/// Readiness acknowledgment.
pub const READY_ACK: &str = "readyok";
/// Prefix of the completion-with-result line ending one search.
pub const COMPLETION_PREFIX: &str = "bestmove";
/// Cancellation directive interrupting an in-flight search.
pub const CANCEL_DIRECTIVE: &str = "stop";
/// Prefix of the node-count diagnostic line (`go perft` flows).
pub const NODES_PREFIX: &str = "Nodes searched:";

/// Typed evaluation embedded in `info … score …` lines.
///
/// Consumers retain only the most recent score observed within one
/// iteration's transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Centipawn evaluation from the engine's point of view.
    Cp(i32),
    /// Forced mate in the given number of moves (negative: being mated).
    Mate(i32),
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cp(value) => write!(f, "cp {value}"),
            Self::Mate(value) => write!(f, "mate {value}"),
        }
    }
}

/// Whether `line` starts with `token` as its first whitespace-delimited field.
#[must_use]
pub fn starts_with_token(line: &str, token: &str) -> bool {
    line.split_whitespace().next() == Some(token)
}

/// Extract the result token (second whitespace-delimited field) of a
/// completion line, e.g. `bestmove e2e4 ponder e7e5` → `e2e4`.
#[must_use]
pub fn parse_best_move(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some(COMPLETION_PREFIX) {
        return None;
    }
    fields.next()
}

/// Extract the typed score from an `info` line, if one is present.
///
/// Scans for the `score` keyword followed by a `cp` or `mate` shape selector
/// and its integer value; malformed tails yield `None`.
#[must_use]
pub fn parse_score(line: &str) -> Option<Score> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some("info") {
        return None;
    }
    while let Some(field) = fields.next() {
        if field != "score" {
            continue;
        }
        let kind = fields.next()?;
        let value: i32 = fields.next()?.parse().ok()?;
        return match kind {
            "cp" => Some(Score::Cp(value)),
            "mate" => Some(Score::Mate(value)),
            _ => None,
        };
    }
    None
}

/// Extract the node count from a `Nodes searched: <n>` diagnostic line.
///
/// The value is the trailing whitespace-delimited integer field.
#[must_use]
pub fn parse_node_count(line: &str) -> Option<u64> {
    if !line.trim_start().starts_with(NODES_PREFIX) {
        return None;
    }
    line.split_whitespace().next_back()?.parse().ok()
}
