//! # Example: tagged_cancel
//!
//! Shows tag de-duplication, cancellation and broadcast results between two clients.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► editor: run_operation_tagged(sync, "sync")   → #1
//!   ├─► editor: run_operation_tagged(sync, "sync")   → #1 again (still running)
//!   ├─► editor: cancel_tag("sync")                   → true, result never delivered
//!   ├─► editor: run_broadcast(stats)                 → #2
//!   │     ├─► editor  receives #2 as its own result
//!   │     └─► sidebar receives #2 as a broadcast
//!   └─► shutdown
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=taskrelay=debug cargo run --example tagged_cancel
//! ```

use std::time::Duration;

use taskrelay::{Config, Connector, Delivered, OperationError, OperationFn, Relay, ResultSink};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn long_sync() -> impl taskrelay::Operation<Output = u64> {
    OperationFn::new("sync", |ctx: CancellationToken| async move {
        for step in 0..50u64 {
            if ctx.is_cancelled() {
                println!("[sync] cancelled at step {step}");
                return Err(OperationError::Canceled);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok::<_, OperationError>(50u64)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    println!("=== tagged_cancel example ===\n");

    // Cancels flag the token and let the body notice it.
    let relay = Relay::builder(Config {
        max_concurrent: 2,
        interrupt_on_cancel: false,
        ..Config::default()
    })
    .build()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let editor_tx = tx.clone();
    let editor_sink = ResultSink::builder()
        .name("editor")
        .on_result::<u64, _>(move |d: Delivered<'_, u64>| {
            let _ = editor_tx.send(format!("[editor] own {} -> {:?}", d.id, d.output));
        })
        .build();
    let sidebar_sink = ResultSink::builder()
        .name("sidebar")
        .on_broadcast::<u64, _>(move |d: Delivered<'_, u64>| {
            let _ = tx.send(format!("[sidebar] broadcast {} -> {:?}", d.id, d.output));
        })
        .build();

    let editor = Connector::attach(&relay, editor_sink, None);
    let sidebar = Connector::attach(&relay, sidebar_sink, None);
    editor.activate();
    sidebar.activate();

    // 1. Tag de-duplication
    let first = editor.run_operation_tagged(long_sync(), "sync");
    let again = editor.run_operation_tagged(long_sync(), "sync");
    println!("[editor] launched {first}, relaunch returned {again}");

    // 2. Cancellation (foreign listeners are refused)
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("[sidebar] cancel {first}: {}", sidebar.cancel(first));
    println!("[editor] cancel tag sync: {}", editor.cancel_tag("sync"));
    println!("[editor] sync running: {}", editor.is_tag_running("sync"));

    // 3. Broadcast
    let stats = OperationFn::new("stats", |_ctx: CancellationToken| async {
        Ok::<_, OperationError>(7u64)
    });
    let id = editor.run_broadcast(stats);
    println!("[editor] broadcast launched {id}");

    for _ in 0..2 {
        if let Some(line) = rx.recv().await {
            println!("{line}");
        }
    }

    relay.shutdown();
    println!("\n=== done ===");
    Ok(())
}
