#![forbid(unsafe_code)]

//! `ucibench` — scripted benchmark sessions against an in-process engine.
//!
//! Bootstraps configuration and tracing, hosts the scripted engine on an
//! adapter instance, and drives one session to completion, printing each
//! session event as text or NDJSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ucibench::session::event::SessionEvent;
use ucibench::session::runner::SessionRunner;
use ucibench::{AppError, HarnessConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ucibench", about = "Embedded UCI engine benchmark harness", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log and event output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured iteration cap.
    #[arg(long)]
    iterations: Option<u32>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("ucibench bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = HarnessConfig::load_from_path(&args.config)?;
    if let Some(cap) = args.iterations {
        config.session.max_iterations = Some(cap);
    }
    info!("configuration loaded");

    // ── Build the hosted engine and session ─────────────
    let engine = config.engine.build();
    let runner = Arc::new(SessionRunner::with_engine(engine, config.session));
    info!(run_id = %runner.run_id(), "session prepared");

    // ── Forward interrupt signals as a cooperative stop ─
    let signal_runner = Arc::clone(&runner);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping session");
        signal_runner.stop();
    });

    // ── Drain events to stdout ──────────────────────────
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event, args.log_format);
        }
    });

    let summary = runner.run(event_tx).await;
    if printer.await.is_err() {
        warn!("event printer task panicked");
    }

    if summary.errors > 0 {
        return Err(AppError::Protocol(format!(
            "session finished with {} error(s)",
            summary.errors
        )));
    }
    Ok(())
}

/// Render one session event to stdout.
fn print_event(event: &SessionEvent, format: LogFormat) {
    match format {
        LogFormat::Json => {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        }
        LogFormat::Text => match event {
            SessionEvent::Started {
                run_id,
                positions,
                max_iterations,
            } => match max_iterations {
                Some(cap) => println!("started run {run_id}: {positions} position(s), cap {cap}"),
                None => println!("started run {run_id}: {positions} position(s), unbounded"),
            },
            SessionEvent::OutputLine { line } => println!("  << {line}"),
            SessionEvent::IterationStarted { index, position } => {
                println!("iteration {index}: {position}");
            }
            SessionEvent::IterationCompleted {
                index,
                best_move,
                score,
                elapsed_ms,
            } => match score {
                Some(score) => {
                    println!("iteration {index}: {best_move} ({score}) in {elapsed_ms} ms");
                }
                None => println!("iteration {index}: {best_move} in {elapsed_ms} ms"),
            },
            SessionEvent::TimedOut {
                index, elapsed_ms, ..
            } => println!("iteration {index}: timed out after {elapsed_ms} ms"),
            SessionEvent::Stopped => println!("stopped on request"),
            SessionEvent::Error { message } => println!("error: {message}"),
            SessionEvent::Finished { summary } => println!(
                "finished: {}/{} completed, {} timeout(s), {} error(s) in {} ms",
                summary.completed,
                summary.attempted,
                summary.timeouts,
                summary.errors,
                summary.elapsed_ms
            ),
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
