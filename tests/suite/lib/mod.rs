use std::{
    io,
    sync::{Arc, Mutex},
};

use kispec::{
    Outcome, Reporter, ReporterError, SpecHeader, Suite, SuiteConfig, SuiteSummary,
    reporter::forward::Poster,
};

#[derive(Debug, Default, Clone)]
pub struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::other("poison error"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Records every lifecycle call as one line.
#[derive(Debug, Default, Clone)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }
}

impl Reporter for Events {
    fn suite_will_begin(
        &mut self,
        _: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError> {
        self.push(format!("suite_will_begin {}", summary.specs_to_run));
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
        self.push(format!(
            "suite_did_end {} passed {} failed",
            summary.passed, summary.failed
        ));
        Ok(())
    }
}

/// Poster that hands every body to the test instead of the network.
#[derive(Debug, Default, Clone)]
pub struct Wire(Arc<Mutex<Vec<(String, Vec<u8>)>>>);

impl Wire {
    pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
        self.0.lock().unwrap().clone()
    }
}

impl Poster for Wire {
    fn post(&mut self, url: &str, _: &str, body: &[u8]) -> io::Result<()> {
        self.0.lock().unwrap().push((url.to_owned(), body.to_vec()));
        Ok(())
    }
}

/// A suite with a recording reporter whose captured output goes to a buffer.
///
/// Panic capture is off: the panic hook is process-wide and these tests run
/// in parallel.
pub fn suite(config: SuiteConfig) -> (Suite, Events, Buffer) {
    let events = Events::default();
    let sink = Buffer::default();
    let suite = Suite::new(config)
        .with_reporter(events.clone())
        .with_output_sink(sink.clone())
        .with_panic_capture(false);
    (suite, events, sink)
}
