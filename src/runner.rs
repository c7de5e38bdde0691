//! Executing one resolved spec.
//!
//! A spec with disposition [`Run`](Disposition::Run) walks through
//! `Idle → RunningBeforeEach → RunningJustBeforeEach → RunningBody →
//! RunningAfterEach → Done`. The first failing before hook skips the rest of
//! the before phases and the body, after hooks always run. Pending and skipped
//! specs go from `Idle` straight to `Done`.
//!
//! Measurement leaves repeat the whole walk once per sample.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::trace;

use crate::{
    context::{RunState, SpecContext},
    measure::Benchmarker,
    node::HookKind,
    node_runner::{NodeStatus, run_measure, run_node},
    outcome::{Outcome, SpecState},
    resolve::{Disposition, Spec},
    tree::LeafKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RunningBeforeEach,
    RunningJustBeforeEach,
    RunningBody,
    RunningAfterEach,
    Done,
}

#[derive(Debug)]
pub(crate) struct SpecRunner<'r> {
    state: &'r Arc<RunState>,
    default_timeout: Duration,
}

impl<'r> SpecRunner<'r> {
    pub(crate) fn new(state: &'r Arc<RunState>, default_timeout: Duration) -> Self {
        Self {
            state,
            default_timeout,
        }
    }

    pub(crate) fn run(&self, spec: &Spec<'_>) -> Outcome {
        let not_run = match spec.disposition {
            Disposition::Run => None,
            Disposition::Skip => Some(SpecState::Skipped),
            Disposition::Pending => Some(SpecState::Pending),
        };
        if let Some(state) = not_run {
            let mut phase = Phase::Idle;
            transition(spec, &mut phase, Phase::Done);
            return Outcome::not_run(state);
        }

        self.state.output().truncate();
        let ctx = self.state.begin_spec(spec.header());
        let location = &spec.leaf.location;

        let now = Instant::now();
        let measurements = match &spec.leaf.kind {
            LeafKind::It(body) => {
                self.execute(spec, &ctx, |ctx| {
                    run_node(body, ctx, location, self.default_timeout)
                });
                Vec::new()
            }
            LeafKind::Measure { body, samples } => {
                let mut benchmarker = Benchmarker::new();
                for sample in 0..*samples {
                    trace!(spec = spec.index, sample, "measurement sample");
                    // A failed sample does not stop the ones after it.
                    self.execute(spec, &ctx, |ctx| {
                        run_measure(body, ctx, &mut benchmarker, location)
                    });
                }
                benchmarker.into_measurements()
            }
        };
        let elapsed = now.elapsed();

        let failure = self.state.end_spec();
        let state = failure
            .as_ref()
            .map_or(SpecState::Passed, |failure| failure.kind.into());
        Outcome {
            state,
            failure,
            elapsed,
            measurements,
        }
    }

    /// One pass through the hook chain around `body`.
    fn execute<F>(&self, spec: &Spec<'_>, ctx: &SpecContext, body: F)
    where
        F: FnOnce(&SpecContext) -> NodeStatus,
    {
        let mut phase = Phase::Idle;

        transition(spec, &mut phase, Phase::RunningBeforeEach);
        let mut failed = self.run_hooks(spec, ctx, HookKind::BeforeEach, true);

        if !failed {
            transition(spec, &mut phase, Phase::RunningJustBeforeEach);
            failed = self.run_hooks(spec, ctx, HookKind::JustBeforeEach, true);
        }

        if !failed {
            transition(spec, &mut phase, Phase::RunningBody);
            self.node(|| body(ctx));
        }

        transition(spec, &mut phase, Phase::RunningAfterEach);
        self.run_hooks(spec, ctx, HookKind::AfterEach, false);

        transition(spec, &mut phase, Phase::Done);
    }

    /// Run every hook of `kind` for `spec`, returns whether any of them failed.
    fn run_hooks(&self, spec: &Spec<'_>, ctx: &SpecContext, kind: HookKind, stop: bool) -> bool {
        let mut failed = false;
        for hook in spec.hooks(kind) {
            failed |= self.node(|| run_node(&hook.body, ctx, &hook.location, self.default_timeout));
            if failed && stop {
                break;
            }
        }
        failed
    }

    /// Run a single node and record its failure, returns whether it failed.
    ///
    /// A node also counts as failed when it recorded a failure through its
    /// context but still returned normally.
    fn node<F>(&self, f: F) -> bool
    where
        F: FnOnce() -> NodeStatus,
    {
        let recorded = self.state.recorded_failures();
        match f() {
            NodeStatus::Passed => self.state.recorded_failures() != recorded,
            NodeStatus::Failed(Some(failure)) => {
                self.state.record_failure(failure);
                true
            }
            NodeStatus::Failed(None) => true,
        }
    }
}

fn transition(spec: &Spec<'_>, phase: &mut Phase, next: Phase) {
    trace!(spec = spec.index, from = ?*phase, to = ?next, "spec runner transition");
    *phase = next;
}
