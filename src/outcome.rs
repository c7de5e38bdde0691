use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{measure::Measurement, node::Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecState {
    Passed,
    Failed,
    Timedout,
    Panicked,
    Skipped,
    Pending,
}

impl SpecState {
    pub fn is_good(&self) -> bool {
        !self.is_bad()
    }

    pub fn is_bad(&self) -> bool {
        matches!(
            self,
            SpecState::Failed | SpecState::Timedout | SpecState::Panicked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Failed,
    Timedout,
    Panicked,
}

impl From<FailureKind> for SpecState {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Failed => SpecState::Failed,
            FailureKind::Timedout => SpecState::Timedout,
            FailureKind::Panicked => SpecState::Panicked,
        }
    }
}

/// Why a spec did not pass, and where it went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub location: Location,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    pub(crate) fn failed(message: impl Into<String>, location: Location) -> Self {
        Self::new(FailureKind::Failed, message, location)
    }

    pub(crate) fn timed_out(timeout: Duration, location: Location) -> Self {
        Self::new(
            FailureKind::Timedout,
            format!("Timed out after {:.3}s", timeout.as_secs_f64()),
            location,
        )
    }

    pub(crate) fn panicked(payload: String, location: Location) -> Self {
        Self::new(
            FailureKind::Panicked,
            format!("Test Panicked\n{payload}"),
            location,
        )
    }
}

/// What a reporter learns about a spec before and after it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecHeader {
    /// Position in the resolved plan, identical in every partition.
    pub index: usize,
    pub component_texts: Vec<String>,
    pub text: String,
    pub location: Location,
    pub is_measurement: bool,
}

impl SpecHeader {
    /// Component texts and the leaf text joined by spaces.
    pub fn full_text(&self) -> String {
        self.component_texts
            .iter()
            .map(String::as_str)
            .chain([self.text.as_str()])
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Outcome {
    pub state: SpecState,
    pub failure: Option<Failure>,
    pub elapsed: Duration,
    pub measurements: Vec<Measurement>,
}

impl Outcome {
    pub(crate) fn not_run(state: SpecState) -> Self {
        Self {
            state,
            failure: None,
            elapsed: Duration::ZERO,
            measurements: Vec::new(),
        }
    }

    pub fn is_good(&self) -> bool {
        self.state.is_good()
    }

    pub fn is_bad(&self) -> bool {
        self.state.is_bad()
    }

    pub fn passed(&self) -> bool {
        self.state == SpecState::Passed
    }

    pub fn failed(&self) -> bool {
        self.state == SpecState::Failed
    }

    pub fn timed_out(&self) -> bool {
        self.state == SpecState::Timedout
    }

    pub fn panicked(&self) -> bool {
        self.state == SpecState::Panicked
    }

    pub fn skipped(&self) -> bool {
        self.state == SpecState::Skipped
    }

    pub fn pending(&self) -> bool {
        self.state == SpecState::Pending
    }

    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name == name)
    }
}

/// Counts describing a whole run, sent before the first and after the last spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub description: String,
    /// Specs in the resolved plan across all partitions.
    pub total_specs: usize,
    /// Specs this process is responsible for.
    pub partition_specs: usize,
    /// Specs this process will actually execute.
    pub specs_to_run: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub skipped: usize,
    pub run_time: Duration,
    pub success: bool,
}

impl SuiteSummary {
    pub(crate) fn count(&mut self, outcome: &Outcome) {
        match outcome.state {
            SpecState::Passed => self.passed += 1,
            SpecState::Failed | SpecState::Timedout | SpecState::Panicked => self.failed += 1,
            SpecState::Pending => self.pending += 1,
            SpecState::Skipped => self.skipped += 1,
        }
    }
}
