//! Relaying lifecycle events to a remote aggregator.
//!
//! Every event becomes a versioned JSON [`Envelope`] posted to
//! `<endpoint>/<route>`. The transport itself is a [`Poster`] supplied by the
//! embedding binary.

use std::{io, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::{Partition, SuiteConfig},
    error::{ReporterError, WireError},
    outcome::{Outcome, SpecHeader, SuiteSummary},
    output::OutputBuffer,
    reporter::Reporter,
};

pub const PROTOCOL_VERSION: u32 = 1;
pub const CONTENT_TYPE: &str = "application/json";

/// Sends one request body to a remote endpoint.
pub trait Poster: Send {
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> io::Result<()>;
}

impl<F> Poster for F
where
    F: FnMut(&str, &str, &[u8]) -> io::Result<()> + Send,
{
    fn post(&mut self, url: &str, content_type: &str, body: &[u8]) -> io::Result<()> {
        self(url, content_type, body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub partition: Partition,
    pub event: WireEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireEvent {
    SuiteWillBegin {
        config: SuiteConfig,
        summary: SuiteSummary,
    },
    SpecWillRun {
        spec: SpecHeader,
    },
    SpecDidComplete {
        spec: SpecHeader,
        outcome: Outcome,
    },
    SuiteDidEnd {
        summary: SuiteSummary,
    },
    /// Captured output of a failed spec, sent right before its completion.
    Output {
        spec_index: usize,
        output: String,
    },
}

impl WireEvent {
    pub fn route(&self) -> &'static str {
        match self {
            WireEvent::SuiteWillBegin { .. } => "SpecSuiteWillBegin",
            WireEvent::SpecWillRun { .. } => "SpecWillRun",
            WireEvent::SpecDidComplete { .. } => "SpecDidComplete",
            WireEvent::SuiteDidEnd { .. } => "SpecSuiteDidEnd",
            WireEvent::Output { .. } => "SpecOutput",
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl Envelope {
    pub fn new(partition: Partition, event: WireEvent) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            partition,
            event,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Encode)
    }

    /// Decode a payload, rejecting other protocol versions before looking at the event.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let probe: VersionProbe = serde_json::from_slice(bytes).map_err(WireError::Decode)?;
        if probe.version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion {
                found: probe.version,
                expected: PROTOCOL_VERSION,
            });
        }
        serde_json::from_slice(bytes).map_err(WireError::Decode)
    }
}

/// Reporter that forwards every event to a remote aggregator.
pub struct ForwardingReporter<P> {
    endpoint: String,
    partition: Partition,
    poster: P,
    output: Option<Arc<OutputBuffer>>,
}

impl<P> std::fmt::Debug for ForwardingReporter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingReporter")
            .field("endpoint", &self.endpoint)
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl<P: Poster> ForwardingReporter<P> {
    pub fn new(endpoint: impl Into<String>, partition: Partition, poster: P) -> Self {
        Self {
            endpoint: endpoint.into(),
            partition,
            poster,
            output: None,
        }
    }

    /// Relay captured output of failed specs from `output`.
    ///
    /// Only buffered output is relayed. In [`OutputMode::Verbose`](crate::output::OutputMode)
    /// writes go straight to the local sink and the aggregator never sees them.
    pub fn with_output(self, output: Arc<OutputBuffer>) -> Self {
        Self {
            output: Some(output),
            ..self
        }
    }

    fn send(&mut self, event: WireEvent) -> Result<(), ReporterError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), event.route());
        let body = Envelope::new(self.partition, event).encode()?;
        self.poster
            .post(&url, CONTENT_TYPE, &body)
            .map_err(|source| ReporterError::Transport { url, source })
    }
}

impl<P: Poster> Reporter for ForwardingReporter<P> {
    fn suite_will_begin(
        &mut self,
        config: &SuiteConfig,
        summary: &SuiteSummary,
    ) -> Result<(), ReporterError> {
        self.send(WireEvent::SuiteWillBegin {
            config: config.clone(),
            summary: summary.clone(),
        })
    }

    fn spec_will_run(&mut self, spec: &SpecHeader) -> Result<(), ReporterError> {
        self.send(WireEvent::SpecWillRun { spec: spec.clone() })
    }

    fn spec_did_complete(
        &mut self,
        spec: &SpecHeader,
        outcome: &Outcome,
    ) -> Result<(), ReporterError> {
        let captured = match &self.output {
            Some(output) if outcome.is_bad() => output.contents(),
            _ => Vec::new(),
        };
        let relayed = match captured.is_empty() {
            true => Ok(()),
            false => self.send(WireEvent::Output {
                spec_index: spec.index,
                output: String::from_utf8_lossy(&captured).into_owned(),
            }),
        };

        // The completion goes out even when relaying the output failed.
        let completed = self.send(WireEvent::SpecDidComplete {
            spec: spec.clone(),
            outcome: outcome.clone(),
        });
        relayed.and(completed)
    }

    fn suite_did_end(&mut self, summary: &SuiteSummary) -> Result<(), ReporterError> {
        self.send(WireEvent::SuiteDidEnd {
            summary: summary.clone(),
        })
    }
}
