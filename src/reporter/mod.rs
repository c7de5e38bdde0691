use std::{
    fmt::{self, Display},
    io,
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    config::SuiteConfig,
    error::ReporterError,
    outcome::{Outcome, SpecHeader, SuiteSummary},
    output::OutputBuffer,
};

pub mod aggregate;
mod console;
pub mod forward;

pub use console::ConsoleReporter;

pub trait Reporter: Send {
    fn suite_will_begin(
        &mut self,
        config: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError>;

    fn spec_will_run(&mut self, spec: &SpecHeader) -> Result<(), ReporterError> {
        let _ = spec;
        Ok(())
    }

    fn spec_did_complete(
        &mut self,
        spec: &SpecHeader,
        outcome: &Outcome,
    ) -> Result<(), ReporterError>;

    fn suite_did_end(&mut self, summary: &SuiteSummary) -> Result<(), ReporterError>;
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn suite_will_begin(
        &mut self,
        config: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError> {
        (**self).suite_will_begin(config, summary)
    }

    fn spec_will_run(&mut self, spec: &SpecHeader) -> Result<(), ReporterError> {
        (**self).spec_will_run(spec)
    }

    fn spec_did_complete(
        &mut self,
        spec: &SpecHeader,
        outcome: &Outcome,
    ) -> Result<(), ReporterError> {
        (**self).spec_did_complete(spec, outcome)
    }

    fn suite_did_end(&mut self, summary: &SuiteSummary) -> Result<(), ReporterError> {
        (**self).suite_did_end(summary)
    }
}

/// Which dispatch step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReporterEvent {
    SuiteWillBegin,
    SpecWillRun,
    SpecDidComplete,
    SuiteDidEnd,
    /// Flushing captured output of a failed spec.
    FlushOutput,
}

impl Display for ReporterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReporterEvent::SuiteWillBegin => "suite_will_begin",
            ReporterEvent::SpecWillRun => "spec_will_run",
            ReporterEvent::SpecDidComplete => "spec_did_complete",
            ReporterEvent::SuiteDidEnd => "suite_did_end",
            ReporterEvent::FlushOutput => "flush_output",
        })
    }
}

pub type ReporterErrors = Vec<(ReporterEvent, ReporterError)>;

/// Sends every event to its reporters in registration order.
///
/// A reporter failing an event is logged and skipped, the error is kept.
#[derive(Default)]
pub struct Dispatcher {
    reporters: Vec<Box<dyn Reporter>>,
    output: Option<Arc<OutputBuffer>>,
    errors: ReporterErrors,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reporters", &self.reporters.len())
            .field("output", &self.output)
            .field("errors", &self.errors)
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.push(Box::new(reporter));
        self
    }

    /// Truncate `output` before every spec and flush it after every failed one.
    pub fn with_output(self, output: Arc<OutputBuffer>) -> Self {
        Self {
            output: Some(output),
            ..self
        }
    }

    pub fn push(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    pub fn errors(&self) -> &[(ReporterEvent, ReporterError)] {
        &self.errors
    }

    pub fn into_errors(self) -> ReporterErrors {
        self.errors
    }

    fn each<F>(&mut self, event: ReporterEvent, mut f: F)
    where
        F: FnMut(&mut dyn Reporter) -> Result<(), ReporterError>,
    {
        for (position, reporter) in self.reporters.iter_mut().enumerate() {
            if let Err(err) = f(reporter.as_mut()) {
                warn!(%event, reporter = position, %err, "reporter failed to handle event");
                self.errors.push((event, err));
            }
        }
    }

    pub fn suite_will_begin(&mut self, config: &SuiteConfig, summary: &SuiteSummary) {
        debug!(
            description = %summary.description,
            specs = summary.specs_to_run,
            "suite will begin"
        );
        self.each(ReporterEvent::SuiteWillBegin, |r| {
            r.suite_will_begin(config, summary)
        });
    }

    pub fn spec_will_run(&mut self, spec: &SpecHeader) {
        if let Some(output) = &self.output {
            output.truncate();
        }
        self.each(ReporterEvent::SpecWillRun, |r| r.spec_will_run(spec));
    }

    pub fn spec_did_complete(&mut self, spec: &SpecHeader, outcome: &Outcome) {
        self.each(ReporterEvent::SpecDidComplete, |r| {
            r.spec_did_complete(spec, outcome)
        });

        if outcome.is_bad()
            && let Some(output) = &self.output
            && let Err(err) = output.flush()
        {
            warn!(%err, spec = spec.index, "failed to flush captured output");
            self.errors
                .push((ReporterEvent::FlushOutput, ReporterError::Io(err)));
        }
    }

    pub fn suite_did_end(&mut self, summary: &SuiteSummary) {
        debug!(success = summary.success, "suite did end");
        self.each(ReporterEvent::SuiteDidEnd, |r| r.suite_did_end(summary));
    }
}

/// The reporter a suite uses when none is configured explicitly.
///
/// With a remote reporting server configured every event is forwarded there
/// through `poster`, otherwise a [`ConsoleReporter`] writes to stdout.
pub fn default_reporter<P>(
    config: &SuiteConfig,
    output: &Arc<OutputBuffer>,
    poster: P,
) -> Box<dyn Reporter>
where
    P: forward::Poster + 'static,
{
    match &config.remote_reporting_server {
        Some(endpoint) => {
            debug!(%endpoint, "forwarding reporter events");
            let reporter = forward::ForwardingReporter::new(endpoint.clone(), config.partition, poster)
                .with_output(Arc::clone(output));
            Box::new(reporter)
        }
        None => Box::new(ConsoleReporter::new(io::stdout())),
    }
}
