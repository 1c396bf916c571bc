//! Shared helpers for unit tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::OperationError;
use crate::events::LaunchId;
use crate::listeners::{Delivered, ResultSink};
use crate::operations::{Operation, OperationFn};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(80);

pub(crate) type Seen = (LaunchId, Result<u32, OperationError>);

/// Operation returning `v` right away.
pub(crate) fn value(v: u32) -> impl Operation<Output = u32> {
    OperationFn::new("value", move |_ctx: CancellationToken| async move {
        Ok::<_, OperationError>(v)
    })
}

/// Holds an operation body until released. The body ignores its token.
pub(crate) struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub(crate) async fn started(&self) {
        timeout(WAIT, self.started.notified())
            .await
            .expect("operation did not start");
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

pub(crate) fn gated(v: u32) -> (impl Operation<Output = u32>, Gate) {
    let gate = Gate {
        started: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let started = Arc::clone(&gate.started);
    let release = Arc::clone(&gate.release);
    let op = OperationFn::new("gated", move |_ctx: CancellationToken| {
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        async move {
            started.notify_one();
            release.notified().await;
            Ok::<_, OperationError>(v)
        }
    });
    (op, gate)
}

/// Receiving side of a [`recording_sink`].
pub(crate) struct Recorder {
    own: mpsc::UnboundedReceiver<Seen>,
    broadcast: mpsc::UnboundedReceiver<Seen>,
}

impl Recorder {
    pub(crate) async fn next_own(&mut self) -> Seen {
        timeout(WAIT, self.own.recv())
            .await
            .expect("no own result delivered")
            .expect("sink dropped")
    }

    pub(crate) async fn next_broadcast(&mut self) -> Seen {
        timeout(WAIT, self.broadcast.recv())
            .await
            .expect("no broadcast result delivered")
            .expect("sink dropped")
    }

    /// Asserts nothing else arrives for a short while.
    pub(crate) async fn assert_quiet(&mut self) {
        tokio::time::sleep(QUIET).await;
        assert!(self.own.try_recv().is_err(), "unexpected own result");
        assert!(self.broadcast.try_recv().is_err(), "unexpected broadcast result");
    }
}

/// Sink with `u32` handlers on both channels, forwarding into a [`Recorder`].
pub(crate) fn recording_sink(name: &'static str) -> (Arc<ResultSink>, Recorder) {
    let (own_tx, own) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast) = mpsc::unbounded_channel();
    let sink = ResultSink::builder()
        .name(name)
        .on_result::<u32, _>(move |d: Delivered<'_, u32>| {
            let _ = own_tx.send((d.id, d.output.copied().map_err(Clone::clone)));
        })
        .on_broadcast::<u32, _>(move |d: Delivered<'_, u32>| {
            let _ = broadcast_tx.send((d.id, d.output.copied().map_err(Clone::clone)));
        })
        .build();
    (sink, Recorder { own, broadcast })
}

/// Polls `cond` until it holds, failing the test after a timeout.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    let polled = timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in time");
}
