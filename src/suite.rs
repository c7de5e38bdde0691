use std::{
    io::Write,
    sync::Arc,
    time::Instant,
};

use tracing::debug;

use crate::{
    SuiteReport,
    capture::CapturePanicHookGuard,
    config::SuiteConfig,
    context::RunState,
    error::{ConfigError, ConfigurationError},
    outcome::{Outcome, SpecState, SuiteSummary},
    output::{OutputBuffer, OutputMode},
    reporter::{Dispatcher, Reporter, default_reporter, forward::Poster},
    resolve,
    runner::SpecRunner,
    tree::{SpecTree, TreeBuilder},
};

#[derive(Debug)]
pub struct Suite {
    config: SuiteConfig,
    dispatcher: Dispatcher,
    output: Arc<OutputBuffer>,
    capture_panics: bool,
}

impl Suite {
    pub fn new(config: SuiteConfig) -> Self {
        let mode = match config.verbose {
            true => OutputMode::Verbose,
            false => OutputMode::Buffered,
        };
        let output = Arc::new(OutputBuffer::stdout(mode));
        Self {
            config,
            dispatcher: Dispatcher::new().with_output(Arc::clone(&output)),
            output,
            capture_panics: true,
        }
    }

    pub fn from_env(description: impl Into<String>) -> Result<Self, ConfigError> {
        SuiteConfig::from_env(description).map(Self::new)
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.dispatcher.push(Box::new(reporter));
        self
    }

    /// Add the reporter picked by [`default_reporter`] for this suite's config.
    pub fn with_default_reporter<P: Poster + 'static>(mut self, poster: P) -> Self {
        let reporter = default_reporter(&self.config, &self.output, poster);
        self.dispatcher.push(reporter);
        self
    }

    /// Where captured output of failed specs ends up, stdout by default.
    pub fn with_output_sink(self, sink: impl Write + Send + 'static) -> Self {
        self.output.set_sink(sink);
        self
    }

    /// Whether panic messages go into the captured output instead of stderr.
    pub fn with_panic_capture(self, capture_panics: bool) -> Self {
        Self {
            capture_panics,
            ..self
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn output(&self) -> &Arc<OutputBuffer> {
        &self.output
    }

    /// Declare the tree with `declare`, then run it.
    ///
    /// A malformed declaration fails before any spec runs and before any
    /// reporter hears about the suite.
    pub fn run<F>(self, declare: F) -> Result<SuiteReport, ConfigurationError>
    where
        F: FnOnce(&mut TreeBuilder),
    {
        let now = Instant::now();
        let Self {
            config,
            mut dispatcher,
            output,
            capture_panics,
        } = self;

        let tree = SpecTree::build(declare)?;
        let plan = resolve::plan(&tree, &config)?;

        let mut summary = SuiteSummary {
            description: config.description.clone(),
            total_specs: plan.total_specs(),
            partition_specs: plan.specs().len(),
            specs_to_run: plan.specs_to_run(),
            ..Default::default()
        };
        dispatcher.suite_will_begin(&config, &summary);

        let state = RunState::new(Arc::clone(&output));
        let runner = SpecRunner::new(&state, config.default_timeout);
        let guard = capture_panics.then(|| CapturePanicHookGuard::install(Arc::clone(&output)));

        let mut outcomes = Vec::with_capacity(plan.specs().len());
        let mut failed_fast = false;
        for spec in plan.specs() {
            let header = spec.header();
            dispatcher.spec_will_run(&header);

            let outcome = match failed_fast {
                true => Outcome::not_run(SpecState::Skipped),
                false => runner.run(spec),
            };
            if outcome.is_bad() && config.fail_fast && !failed_fast {
                debug!(spec = header.index, "failing fast, skipping remaining specs");
                failed_fast = true;
            }

            summary.count(&outcome);
            dispatcher.spec_did_complete(&header, &outcome);
            outcomes.push((header, outcome));
        }
        drop(guard);

        summary.run_time = now.elapsed();
        summary.success = summary.failed == 0;
        dispatcher.suite_did_end(&summary);

        Ok(SuiteReport {
            outcomes,
            summary,
            duration: now.elapsed(),
            reporter_errors: dispatcher.into_errors(),
        })
    }
}
