//! Integration tests for readiness probing under concurrency.
//!
//! The probe/acknowledgment exchange must survive heavy concurrent command
//! submission (no lost wake-ups, no deadlock) and stay idempotent.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serial_test::serial;

use ucibench::engine::adapter::EngineAdapter;
use ucibench::engine::bridge::LineSink;
use ucibench::engine::channel::LineChannel;
use ucibench::engine::stub::ScriptedEngine;
use ucibench::session::protocol;

/// Adapter whose output lines feed a [`LineChannel`].
fn channel_adapter() -> (Arc<EngineAdapter>, Arc<LineChannel>) {
    let channel = Arc::new(LineChannel::new());
    let sink: Arc<dyn LineSink> = channel.clone();
    let adapter = Arc::new(EngineAdapter::new(
        ScriptedEngine::new().with_search_delay(Duration::ZERO),
        sink,
    ));
    (adapter, channel)
}

/// Await a line starting with `token`, skipping everything else.
async fn wait_for_token(channel: &LineChannel, token: &str) {
    let wait = async {
        loop {
            match channel.next().await {
                Some(line) if protocol::starts_with_token(&line, token) => break,
                Some(_) => {}
                None => panic!("channel closed before '{token}' was observed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{token}'"));
}

#[tokio::test]
#[serial]
async fn readiness_probe_after_200_concurrent_sends_is_acknowledged() {
    let (adapter, channel) = channel_adapter();
    adapter.start();

    let senders: Vec<_> = (0..200)
        .map(|i| {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || {
                adapter.send_command(&format!("setoption name Opt{i} value 1"));
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }

    adapter.send_command(protocol::READY_DIRECTIVE);
    wait_for_token(&channel, protocol::READY_ACK).await;

    adapter.stop();
}

#[tokio::test]
async fn repeated_readiness_probes_are_each_acknowledged() {
    let (adapter, channel) = channel_adapter();
    adapter.start();

    for _ in 0..5 {
        adapter.send_command(protocol::READY_DIRECTIVE);
        wait_for_token(&channel, protocol::READY_ACK).await;
    }

    adapter.stop();
}
