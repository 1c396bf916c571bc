//! # Example: lifecycle
//!
//! A client launches work, goes away before it finishes, and comes back later
//! under the same listener id to pick up the result.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Connector::attach(relay, sink, None)  → listener L0
//!   ├─► activate, run_operation("report")     → launch #1
//!   ├─► persist_listener_id()                 → 0
//!   ├─► deactivate, drop connector            (client gone)
//!   │     └─► report finishes                 → buffered in L0
//!   └─► Connector::attach(relay, sink, Some(0))
//!         └─► activate                        → report delivered
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=taskrelay=debug cargo run --example lifecycle
//! ```

use std::time::Duration;

use taskrelay::{
    Config, Connector, Delivered, ListenerId, OperationError, OperationFn, Relay, ResultSink,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn screen(name: &'static str, done: mpsc::UnboundedSender<()>) -> std::sync::Arc<ResultSink> {
    ResultSink::builder()
        .name(name)
        .on_result::<String, _>(move |d: Delivered<'_, String>| {
            match d.output {
                Ok(report) => println!("[{name}] {} delivered: {report}", d.id),
                Err(e) => println!("[{name}] {} failed: {e}", d.id),
            }
            let _ = done.send(());
        })
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("=== lifecycle example ===\n");

    let relay = Relay::builder(Config::default()).build()?;
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    // 1. First client session
    let first = Connector::attach(&relay, screen("session-1", done_tx.clone()), None);
    first.activate();

    let report = OperationFn::new("report", |ctx: CancellationToken| async move {
        tokio::select! {
            _ = ctx.cancelled() => Err(OperationError::Canceled),
            _ = tokio::time::sleep(Duration::from_millis(300)) => Ok("42 rows".to_string()),
        }
    });
    let id = first.run_operation(report);
    println!("[session-1] launched {id}");

    // 2. Client goes away, keeping only its listener id
    let saved = first.persist_listener_id();
    first.deactivate();
    drop(first);
    println!("[session-1] gone, saved listener id {saved}");

    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Some(listener) = relay.listeners().get(ListenerId::from(saved)) {
        println!("[relay] {} result(s) waiting for the client", listener.pending_len());
    }

    // 3. Client comes back
    let second = Connector::attach(&relay, screen("session-2", done_tx), Some(saved.into()));
    second.activate();
    done_rx.recv().await;

    relay.shutdown();
    println!("\n=== done ===");
    Ok(())
}
