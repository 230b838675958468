//! Stream bridge between the command queue and the blocking engine loop.
//!
//! The engine loop is written against plain `std::io` traits: it reads
//! command lines from a [`BufRead`] source and writes response bytes to a
//! [`Write`] sink, never touching process-global stream state. This module
//! provides both halves of that bridge:
//!
//! - [`CommandReader`] exposes a [`CommandQueue`] as a sequential line
//!   source, blocking on `pop` and reporting EOF once the queue is closed
//!   and drained.
//! - [`LineWriter`] accumulates written bytes and forwards each completed
//!   line (terminator stripped, carriage returns ignored) to a [`LineSink`].

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use crate::engine::queue::CommandQueue;

// ── Capability seams ─────────────────────────────────────────────────────────

/// Receiver for completed engine output lines.
///
/// Exactly one sink is bound per adapter run; it is invoked synchronously on
/// the engine worker thread. Fan-out to multiple logical consumers is
/// composition via [`Tee`], not a channel feature. The common async-consumer
/// wiring is a [`LineChannel`](crate::engine::channel::LineChannel), which
/// implements this trait by buffering into itself.
pub trait LineSink: Send + Sync {
    /// Accept one completed output line, without its terminator.
    fn accept(&self, line: &str);
}

/// Adapter turning a plain closure into a [`LineSink`].
pub struct FnSink<F>(pub F);

impl<F> LineSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn accept(&self, line: &str) {
        (self.0)(line);
    }
}

/// A [`LineSink`] that forwards every line to several downstream sinks.
#[derive(Default)]
pub struct Tee {
    sinks: Vec<Arc<dyn LineSink>>,
}

impl Tee {
    /// Build a tee over the given downstream sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn LineSink>>) -> Self {
        Self { sinks }
    }
}

impl LineSink for Tee {
    fn accept(&self, line: &str) {
        for sink in &self.sinks {
            sink.accept(line);
        }
    }
}

/// The externally supplied blocking engine procedure.
///
/// Implementations consume `input` line by line and write newline-terminated
/// responses to `output` until a `quit` directive is read or `input` reports
/// EOF. The adapter invokes `run` exactly once, on a dedicated worker thread.
pub trait EngineLoop: Send {
    /// Run the engine until quit or end of input.
    fn run(self: Box<Self>, input: &mut dyn BufRead, output: &mut dyn Write);
}

/// Adapter turning a plain closure into an [`EngineLoop`].
///
/// Mostly useful in tests and examples, where the "engine" is a few lines
/// of scripted behavior rather than a full implementation.
pub struct FnEngine<F>(pub F);

impl<F> EngineLoop for FnEngine<F>
where
    F: FnOnce(&mut dyn BufRead, &mut dyn Write) + Send,
{
    fn run(self: Box<Self>, input: &mut dyn BufRead, output: &mut dyn Write) {
        (self.0)(input, output);
    }
}

// ── Input bridge ─────────────────────────────────────────────────────────────

/// Sequential line source over a [`CommandQueue`].
///
/// Each dequeued command is served with exactly one trailing `\n` (appended
/// when missing) so line-oriented parsing in the engine loop always frames
/// correctly. Commands are delivered whole and in FIFO order; two commands
/// never interleave partial bytes.
#[derive(Debug)]
pub struct CommandReader {
    queue: Arc<CommandQueue>,
    current: Vec<u8>,
    pos: usize,
}

impl CommandReader {
    /// Bind a reader to a shared command queue.
    #[must_use]
    pub fn new(queue: Arc<CommandQueue>) -> Self {
        Self {
            queue,
            current: Vec::new(),
            pos: 0,
        }
    }

    /// Block for the next command; false means end of input.
    fn refill(&mut self) -> bool {
        match self.queue.pop() {
            Some(mut line) => {
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                self.current = line.into_bytes();
                self.pos = 0;
                true
            }
            None => {
                self.current.clear();
                self.pos = 0;
                false
            }
        }
    }
}

impl Read for CommandReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.current.len() && !self.refill() {
            return Ok(0);
        }
        let available = &self.current[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl BufRead for CommandReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.current.len() {
            // An empty slice after a failed refill is the EOF signal.
            self.refill();
        }
        Ok(&self.current[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.current.len());
    }
}

// ── Output bridge ────────────────────────────────────────────────────────────

/// Line-framing writer that forwards completed lines to a [`LineSink`].
///
/// Bytes accumulate until a `\n`; the sink then receives the buffered text
/// with the terminator stripped. Carriage returns are discarded so mixed
/// `\r\n` / `\n` terminator styles frame identically. [`Write::flush`] emits
/// any non-empty partial line exactly once (used on shutdown so a trailing
/// unterminated response is not lost).
pub struct LineWriter {
    sink: Arc<dyn LineSink>,
    buffer: Vec<u8>,
}

impl LineWriter {
    /// Bind a writer to the run's line sink.
    #[must_use]
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
        }
    }

    /// Forward the buffered line to the sink, if any.
    fn flush_line(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.sink.accept(&line);
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            match byte {
                b'\r' => {}
                b'\n' => self.flush_line(),
                other => self.buffer.push(other),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_line();
        Ok(())
    }
}
