//! Run state shared between the runner and the code it executes.
//!
//! A single [`RunState`] lives for one run. It holds the failure slot of the
//! spec being executed and the [`OutputBuffer`]. Node bodies reach it through
//! a [`SpecContext`].
//!
//! An asynchronous body that times out keeps running on its own thread. Its
//! context still points at the same run state, so a failure it records later
//! lands in whatever spec is current at that moment, or in the next spec when
//! it arrives while none is running. Such writes are logged, not prevented.

use std::{
    io::Write,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::{
    node::{Interrupt, Location},
    node_runner::{NodeStatus, payload_as_string},
    outcome::{Failure, SpecHeader},
    output::{OutputBuffer, SpecWriter},
};

#[derive(Debug)]
pub(crate) struct RunState {
    output: Arc<OutputBuffer>,
    slot: Mutex<FailureSlot>,
    /// Incremented for every spec started, lets contexts tell whether they are stale.
    generation: AtomicUsize,
    /// Incremented on every recorded failure, including suppressed ones.
    recorded: AtomicUsize,
}

#[derive(Debug, Default)]
struct FailureSlot {
    failure: Option<Failure>,
    current: Option<SpecHeader>,
    /// Recorded while no spec was running, handed to the next spec that begins.
    carried: Vec<Failure>,
}

impl RunState {
    pub(crate) fn new(output: Arc<OutputBuffer>) -> Arc<Self> {
        Arc::new(Self {
            output,
            slot: Mutex::new(FailureSlot::default()),
            generation: AtomicUsize::new(0),
            recorded: AtomicUsize::new(0),
        })
    }

    fn slot(&self) -> MutexGuard<'_, FailureSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the failure slot and hand out a context for the spec about to run.
    ///
    /// A failure that arrived between two specs becomes this spec's failure.
    pub(crate) fn begin_spec(self: &Arc<Self>, header: SpecHeader) -> SpecContext {
        let mut slot = self.slot();
        let mut carried = mem::take(&mut slot.carried).into_iter();
        slot.failure = carried.next();
        if let Some(failure) = &slot.failure {
            debug!(spec = header.index, message = %failure.message, "spec starts with a carried failure");
        }
        slot.current = Some(header);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        drop(slot);

        for failure in carried {
            self.suppress(&failure);
        }
        SpecContext {
            state: Arc::clone(self),
            generation,
        }
    }

    /// Take the first failure recorded since the spec began.
    pub(crate) fn end_spec(&self) -> Option<Failure> {
        let mut slot = self.slot();
        slot.current = None;
        slot.failure.take()
    }

    /// Record a failure for the current spec. The first one wins, later ones
    /// only show up in the captured output.
    ///
    /// Outside of a spec the failure is carried into the next one.
    pub(crate) fn record_failure(&self, failure: Failure) {
        self.recorded.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.slot();
        if slot.current.is_none() {
            warn!(
                message = %failure.message,
                location = %failure.location,
                "failure recorded between specs, carrying it into the next spec"
            );
            slot.carried.push(failure);
            return;
        }
        if slot.failure.is_none() {
            slot.failure = Some(failure);
            return;
        }
        drop(slot);
        self.suppress(&failure);
    }

    fn suppress(&self, failure: &Failure) {
        let note = format!(
            "\n[suppressed failure at {}] {}\n",
            failure.location, failure.message
        );
        if let Err(err) = self.output.write(note.as_bytes()) {
            warn!(%err, "failed to log suppressed failure");
        }
    }

    pub(crate) fn recorded_failures(&self) -> usize {
        self.recorded.load(Ordering::SeqCst)
    }

    pub(crate) fn output(&self) -> &Arc<OutputBuffer> {
        &self.output
    }
}

/// Handle given to every node body.
///
/// Contexts are cheap to clone and may be moved to other threads.
#[derive(Debug, Clone)]
pub struct SpecContext {
    state: Arc<RunState>,
    generation: usize,
}

impl SpecContext {
    /// Record a failure for the current spec at the caller's location.
    ///
    /// Return the produced [`Interrupt`] from the body to stop it:
    /// `return Err(ctx.fail("expected a non-empty cart"));`
    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) -> Interrupt {
        let failure = Failure::failed(message, Location::caller());
        self.record(failure);
        Interrupt::recorded()
    }

    pub(crate) fn record(&self, failure: Failure) {
        let current = self.state.generation.load(Ordering::SeqCst);
        if current != self.generation {
            warn!(
                message = %failure.message,
                location = %failure.location,
                "failure recorded by a body that outlived its spec"
            );
        }
        self.state.record_failure(failure);
    }

    /// Run `f`, turning a panic into a recorded failure.
    ///
    /// Threads spawned from a node body should wrap their work in this, a
    /// panic on them is otherwise lost with the thread.
    #[track_caller]
    pub fn recover<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let location = Location::caller();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                let message = format!("Thread panicked\n{}", payload_as_string(payload));
                self.record(Failure::failed(message, location));
                None
            }
        }
    }

    /// Whether the current spec has a failure recorded.
    pub fn has_failed(&self) -> bool {
        self.state.slot().failure.is_some()
    }

    /// Where captured output goes.
    pub fn writer(&self) -> SpecWriter {
        self.state.output().writer()
    }

    /// Convenience for `writeln!(ctx.writer(), ..)` that ignores write errors.
    pub fn log(&self, message: impl AsRef<str>) {
        let _ = writeln!(self.writer(), "{}", message.as_ref());
    }

    /// The spec that is currently running, if any.
    pub fn current_description(&self) -> Option<SpecHeader> {
        self.state.slot().current.clone()
    }
}

/// Completion signal of an asynchronous node.
///
/// Dropping it without calling [`complete`](Done::complete) or
/// [`fail`](Done::fail) leaves the node running until its timeout.
#[derive(Debug)]
pub struct Done {
    tx: Sender<NodeStatus>,
    ctx: SpecContext,
}

impl Done {
    pub(crate) fn new(tx: Sender<NodeStatus>, ctx: SpecContext) -> Self {
        Self { tx, ctx }
    }

    pub fn complete(self) {
        // The runner may have stopped waiting already.
        let _ = self.tx.send(NodeStatus::Passed);
    }

    #[track_caller]
    pub fn fail(self, message: impl Into<String>) {
        let failure = Failure::failed(message, Location::caller());
        self.ctx.record(failure);
        let _ = self.tx.send(NodeStatus::Failed(None));
    }
}
