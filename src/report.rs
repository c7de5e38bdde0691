use std::{process::ExitCode, time::Duration};

use crate::{
    outcome::{Outcome, SpecHeader, SuiteSummary},
    reporter::ReporterErrors,
};

pub type SpecOutcomes = Vec<(SpecHeader, Outcome)>;

#[derive(Debug)]
#[non_exhaustive]
pub struct SuiteReport {
    /// Every spec this process reported, in plan order.
    pub outcomes: SpecOutcomes,
    pub summary: SuiteSummary,
    pub duration: Duration,
    pub reporter_errors: ReporterErrors,
}

impl SuiteReport {
    pub fn success(&self) -> bool {
        self.summary.success
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.success() {
            true => ExitCode::SUCCESS,
            false => ExitCode::FAILURE,
        }
    }

    pub fn outcome(&self, full_text: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(spec, _)| spec.full_text() == full_text)
            .map(|(_, outcome)| outcome)
    }
}
