use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use crate::{
    context::{Done, SpecContext},
    measure::Benchmarker,
    node::{AsyncFn, Interrupt, Location, MeasureBody, NodeBody, NodeResult},
    outcome::Failure,
};

/// What the runner learns from executing one node.
#[derive(Debug)]
pub(crate) enum NodeStatus {
    Passed,
    /// The node failed. `None` when the failure was already recorded on the run state.
    Failed(Option<Failure>),
}

impl NodeStatus {
    fn from_result(result: std::thread::Result<NodeResult>, location: &Location) -> Self {
        match result {
            Ok(Ok(())) => NodeStatus::Passed,
            Ok(Err(Interrupt(message))) => {
                NodeStatus::Failed(message.map(|message| Failure::failed(message, location.clone())))
            }
            Err(payload) => NodeStatus::Failed(Some(Failure::panicked(
                payload_as_string(payload),
                location.clone(),
            ))),
        }
    }
}

/// Convert a panic payload into a string.
///
/// `panic!` produces either a `&'static str` or a `String`, anything else is
/// shown as a placeholder.
pub(crate) fn payload_as_string(err: Box<dyn Any + Send + 'static>) -> String {
    err.downcast::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|err| err.downcast::<String>().map(|s| *s))
        .unwrap_or_else(|_| String::from("non-string panic payload"))
}

pub(crate) fn run_node(
    body: &NodeBody,
    ctx: &SpecContext,
    location: &Location,
    default_timeout: Duration,
) -> NodeStatus {
    match body {
        NodeBody::Sync(f) => {
            NodeStatus::from_result(catch_unwind(AssertUnwindSafe(|| f(ctx))), location)
        }
        NodeBody::Async { body, timeout } => {
            run_async(body, ctx, location, timeout.unwrap_or(default_timeout))
        }
    }
}

pub(crate) fn run_measure(
    body: &MeasureBody,
    ctx: &SpecContext,
    benchmarker: &mut Benchmarker,
    location: &Location,
) -> NodeStatus {
    let result = catch_unwind(AssertUnwindSafe(|| (body.0)(ctx, benchmarker)));
    NodeStatus::from_result(result, location)
}

fn run_async(
    body: &Arc<AsyncFn>,
    ctx: &SpecContext,
    location: &Location,
    timeout: Duration,
) -> NodeStatus {
    // The runner keeps `tx` alive so a dropped `Done` reads as "still running".
    let (tx, rx) = crossbeam_channel::unbounded();
    let done = Done::new(tx.clone(), ctx.clone());

    let spawned = {
        let body = Arc::clone(body);
        let ctx = ctx.clone();
        let location = location.clone();
        let tx = tx.clone();
        thread::Builder::new()
            .name(format!("kispec-async-{location}"))
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| body(ctx.clone(), done)));
                match NodeStatus::from_result(result, &location) {
                    // Completion is signaled through `Done`.
                    NodeStatus::Passed => {}
                    NodeStatus::Failed(failure) => {
                        // Recorded here, the runner may have stopped waiting already.
                        if let Some(failure) = failure {
                            ctx.record(failure);
                        }
                        let _ = tx.send(NodeStatus::Failed(None));
                    }
                }
            })
    };

    if let Err(err) = spawned {
        warn!(%err, %location, "failed to spawn asynchronous node");
        return NodeStatus::Failed(Some(Failure::failed(
            format!("failed to spawn asynchronous node: {err}"),
            location.clone(),
        )));
    }

    let status = match rx.recv_timeout(timeout) {
        Ok(status) => status,
        Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
            debug!(%location, ?timeout, "asynchronous node timed out, leaving it detached");
            NodeStatus::Failed(Some(Failure::timed_out(timeout, location.clone())))
        }
    };
    drop(tx);
    status
}
