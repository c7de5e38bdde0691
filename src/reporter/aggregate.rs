use std::{collections::BTreeSet, io};

use tracing::{debug, warn};

use crate::{
    error::ReporterError,
    outcome::SuiteSummary,
    reporter::{
        Dispatcher,
        forward::{Envelope, WireEvent},
    },
};

/// Replays events posted by every partition onto local reporters as one run.
#[derive(Debug)]
pub struct Aggregator<W: io::Write> {
    expected_partitions: usize,
    dispatcher: Dispatcher,
    sink: W,
    began: bool,
    ended: BTreeSet<usize>,
    summary: Option<SuiteSummary>,
}

impl<W: io::Write> Aggregator<W> {
    /// Replay onto `dispatcher` once `expected_partitions` partitions report.
    ///
    /// Relayed output of failed specs is written to `sink`.
    pub fn new(expected_partitions: usize, dispatcher: Dispatcher, sink: W) -> Self {
        Self {
            expected_partitions,
            dispatcher,
            sink,
            began: false,
            ended: BTreeSet::new(),
            summary: None,
        }
    }

    /// Whether every expected partition ended and the merged end was dispatched.
    pub fn is_finished(&self) -> bool {
        self.ended.len() >= self.expected_partitions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> Dispatcher {
        self.dispatcher
    }

    /// Decode one posted body and apply it.
    pub fn handle(&mut self, body: &[u8]) -> Result<(), ReporterError> {
        let envelope = Envelope::decode(body)?;
        self.apply(envelope)
    }

    pub fn apply(&mut self, envelope: Envelope) -> Result<(), ReporterError> {
        let partition = envelope.partition;
        if partition.count() != self.expected_partitions {
            warn!(
                index = partition.index(),
                count = partition.count(),
                expected = self.expected_partitions,
                "partition count does not match the aggregator"
            );
        }

        match envelope.event {
            WireEvent::SuiteWillBegin { config, summary } => {
                if !self.began {
                    self.began = true;
                    self.dispatcher.suite_will_begin(&config, &summary);
                }
            }
            WireEvent::SpecWillRun { spec } => self.dispatcher.spec_will_run(&spec),
            WireEvent::SpecDidComplete { spec, outcome } => {
                self.dispatcher.spec_did_complete(&spec, &outcome)
            }
            WireEvent::Output { spec_index, output } => {
                debug!(spec = spec_index, partition = partition.index(), "relayed output");
                for line in output.lines() {
                    writeln!(self.sink, "[{}] {line}", partition.index())?;
                }
                self.sink.flush()?;
            }
            WireEvent::SuiteDidEnd { summary } => {
                if !self.ended.insert(partition.index()) {
                    warn!(index = partition.index(), "partition ended twice");
                    return Ok(());
                }
                let merged = match self.summary.take() {
                    Some(merged) => merge(merged, summary),
                    None => summary,
                };
                if self.is_finished() {
                    self.dispatcher.suite_did_end(&merged);
                }
                self.summary = Some(merged);
            }
        }
        Ok(())
    }
}

/// Partitions ran side by side, so run times overlap instead of adding up.
fn merge(a: SuiteSummary, b: SuiteSummary) -> SuiteSummary {
    SuiteSummary {
        description: a.description,
        total_specs: a.total_specs.max(b.total_specs),
        partition_specs: a.partition_specs + b.partition_specs,
        specs_to_run: a.specs_to_run + b.specs_to_run,
        passed: a.passed + b.passed,
        failed: a.failed + b.failed,
        pending: a.pending + b.pending,
        skipped: a.skipped + b.skipped,
        run_time: a.run_time.max(b.run_time),
        success: a.success && b.success,
    }
}
