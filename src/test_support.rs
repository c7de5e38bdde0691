use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex},
};

use crate::{
    config::SuiteConfig,
    error::ReporterError,
    outcome::{Outcome, SpecHeader, SuiteSummary},
    reporter::{Reporter, forward::Poster},
};

/// An in-memory sink that can be inspected while something else writes to it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0.lock().unwrap()))
    }
}

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<String>,
    last_summary: Option<SuiteSummary>,
}

/// Reporter that records every event as a line of text.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter(Arc<Mutex<Recorded>>);

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().events.clone()
    }

    pub fn last_summary(&self) -> Option<SuiteSummary> {
        self.0.lock().unwrap().last_summary.clone()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().events.push(event);
    }
}

impl Reporter for RecordingReporter {
    fn suite_will_begin(
        &mut self,
        _: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError> {
        self.0.lock().unwrap().last_summary = Some(summary.clone());
        self.push("suite_will_begin".into());
        Ok(())
    }

    fn spec_will_run(&mut self, spec: &SpecHeader) -> Result<(), ReporterError> {
        self.push(format!("spec_will_run {}", spec.full_text()));
        Ok(())
    }

    fn spec_did_complete(
        &mut self,
        spec: &SpecHeader,
        outcome: &Outcome,
    ) -> Result<(), ReporterError> {
        self.push(format!(
            "spec_did_complete {} {:?}",
            spec.full_text(),
            outcome.state
        ));
        Ok(())
    }

    fn suite_did_end(&mut self, summary: &SuiteSummary) -> Result<(), ReporterError> {
        self.0.lock().unwrap().last_summary = Some(summary.clone());
        self.push("suite_did_end".into());
        Ok(())
    }
}

/// Poster that keeps every request instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPoster(Arc<Mutex<Vec<(String, Vec<u8>)>>>);

impl RecordingPoster {
    pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
        self.0.lock().unwrap().clone()
    }
}

impl Poster for RecordingPoster {
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> io::Result<()> {
        assert_eq!(content_type, "application/json");
        self.0.lock().unwrap().push((url.to_owned(), body.to_vec()));
        Ok(())
    }
}
