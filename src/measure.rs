use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementKind {
    /// Durations recorded with [`Benchmarker::time`], in seconds.
    Time,
    /// Arbitrary values recorded with [`Benchmarker::record_value`].
    Value,
}

/// Recording handle passed to every sample of a measurement leaf.
#[derive(Debug, Default)]
pub struct Benchmarker {
    series: IndexMap<String, Series>,
}

#[derive(Debug)]
struct Series {
    kind: MeasurementKind,
    results: Vec<f64>,
}

impl Benchmarker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `body` and record how long it took under `name`.
    pub fn time<F: FnOnce()>(&mut self, name: &str, body: F) -> Duration {
        let now = Instant::now();
        body();
        let elapsed = now.elapsed();
        self.record(name, MeasurementKind::Time, elapsed.as_secs_f64());
        elapsed
    }

    pub fn record_value(&mut self, name: &str, value: f64) {
        self.record(name, MeasurementKind::Value, value);
    }

    fn record(&mut self, name: &str, kind: MeasurementKind, value: f64) {
        self.series
            .entry(name.to_owned())
            .or_insert_with(|| Series {
                kind,
                results: Vec::new(),
            })
            .results
            .push(value);
    }

    /// Statistics per name, in the order names were first recorded.
    pub(crate) fn into_measurements(self) -> Vec<Measurement> {
        self.series
            .into_iter()
            .enumerate()
            .map(|(order, (name, series))| {
                Measurement::from_results(name, series.kind, order, series.results)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub kind: MeasurementKind,
    pub order: usize,
    pub results: Vec<f64>,
    pub count: usize,
    pub smallest: f64,
    pub largest: f64,
    pub average: f64,
    /// Population standard deviation.
    pub std_deviation: f64,
}

impl Measurement {
    pub fn from_results(
        name: impl Into<String>,
        kind: MeasurementKind,
        order: usize,
        results: Vec<f64>,
    ) -> Self {
        let count = results.len();
        let (smallest, largest, average, std_deviation) = if results.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let smallest = results.iter().copied().fold(f64::INFINITY, f64::min);
            let largest = results.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let average = results.iter().sum::<f64>() / count as f64;
            let variance = results
                .iter()
                .map(|x| (x - average).powi(2))
                .sum::<f64>()
                / count as f64;
            (smallest, largest, average, variance.sqrt())
        };

        Self {
            name: name.into(),
            kind,
            order,
            results,
            count,
            smallest,
            largest,
            average,
            std_deviation,
        }
    }
}
