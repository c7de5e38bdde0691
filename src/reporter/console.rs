use std::io;

use crate::{
    config::SuiteConfig,
    error::ReporterError,
    outcome::{Outcome, SpecHeader, SpecState, SuiteSummary},
    reporter::Reporter,
};

/// Plain line-oriented reporter.
///
/// Passing, skipped and pending specs print as a single character, failures
/// get a line of their own and are listed again at the end.
#[derive(Debug)]
pub struct ConsoleReporter<W: io::Write> {
    target: W,
    failures: Vec<(SpecHeader, Outcome)>,
    last_ok: bool,
}

impl Default for ConsoleReporter<io::Stdout> {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write> ConsoleReporter<W> {
    pub fn new(target: W) -> Self {
        Self {
            target,
            failures: Vec::new(),
            last_ok: false,
        }
    }

    pub fn with_target<WithTarget: io::Write>(
        self,
        target: WithTarget,
    ) -> ConsoleReporter<WithTarget> {
        ConsoleReporter {
            target,
            failures: self.failures,
            last_ok: self.last_ok,
        }
    }
}

impl<W: io::Write + Send> Reporter for ConsoleReporter<W> {
    fn suite_will_begin(
        &mut self,
        config: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError> {
        writeln!(self.target, "\n{}", summary.description)?;
        if config.partition.is_parallel() {
            writeln!(
                self.target,
                "partition {} of {}",
                config.partition.index(),
                config.partition.count()
            )?;
        }
        match summary.specs_to_run {
            1 => writeln!(self.target, "running 1 of {} specs", summary.total_specs)?,
            count => writeln!(
                self.target,
                "running {count} of {} specs",
                summary.total_specs
            )?,
        }
        Ok(())
    }

    fn spec_did_complete(
        &mut self,
        spec: &SpecHeader,
        outcome: &Outcome,
    ) -> Result<(), ReporterError> {
        match outcome.state {
            SpecState::Passed => write!(self.target, ".")?,
            SpecState::Skipped => write!(self.target, "S")?,
            SpecState::Pending => write!(self.target, "P")?,
            SpecState::Failed | SpecState::Timedout | SpecState::Panicked => {
                if self.last_ok {
                    writeln!(self.target)?;
                }
                writeln!(
                    self.target,
                    "{} --- {}",
                    spec.full_text(),
                    label(outcome.state)
                )?;
                self.failures.push((spec.clone(), outcome.clone()));
            }
        }
        self.last_ok = outcome.is_good();

        for measurement in &outcome.measurements {
            if self.last_ok {
                writeln!(self.target)?;
                self.last_ok = false;
            }
            writeln!(
                self.target,
                "  {}: {} samples, smallest {:.6}, largest {:.6}, average {:.6} ± {:.6}",
                measurement.name,
                measurement.count,
                measurement.smallest,
                measurement.largest,
                measurement.average,
                measurement.std_deviation
            )?;
        }
        Ok(())
    }

    fn suite_did_end(&mut self, summary: &SuiteSummary) -> Result<(), ReporterError> {
        writeln!(self.target)?;
        if !self.failures.is_empty() {
            writeln!(self.target)?;
            writeln!(self.target, "failures:")?;
            for (spec, outcome) in &self.failures {
                writeln!(self.target)?;
                writeln!(self.target, "---- {} ----", spec.full_text())?;
                if let Some(failure) = &outcome.failure {
                    writeln!(self.target, "{}", failure.message)?;
                    writeln!(self.target, "at {}", failure.location)?;
                }
            }
        }

        writeln!(self.target)?;
        write!(self.target, "suite result: ")?;
        match summary.success {
            true => write!(self.target, "ok. ")?,
            false => write!(self.target, "FAILED. ")?,
        }
        writeln!(
            self.target,
            "{} passed; {} failed; {} pending; {} skipped; finished in {:.2}s",
            summary.passed,
            summary.failed,
            summary.pending,
            summary.skipped,
            summary.run_time.as_secs_f64()
        )?;
        self.target.flush()?;
        Ok(())
    }
}

fn label(state: SpecState) -> &'static str {
    match state {
        SpecState::Failed => "FAILED",
        SpecState::Timedout => "TIMED OUT",
        SpecState::Panicked => "PANICKED",
        SpecState::Passed | SpecState::Skipped | SpecState::Pending => "ok",
    }
}
