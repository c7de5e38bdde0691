//! A behavior-driven spec runner.
//!
//! Specs are declared as a tree of groupings and leaves through a
//! [`TreeBuilder`], resolved against focus and pending flags, and executed
//! one by one with their before and after hooks. Every step is reported to
//! the registered [`Reporter`]s, which may forward it to another process.
//!
//! ```no_run
//! use kispec::{Suite, SuiteConfig};
//!
//! let report = Suite::new(SuiteConfig::new("Cart"))
//!     .with_default_reporter(|_: &str, _: &str, _: &[u8]| -> std::io::Result<()> { Ok(()) })
//!     .run(|b| {
//!         b.describe("an empty cart", |b| {
//!             b.it("has no total", |ctx| {
//!                 let items: Vec<u32> = Vec::new();
//!                 if items.iter().sum::<u32>() != 0 {
//!                     return Err(ctx.fail("expected an empty total"));
//!                 }
//!                 Ok(())
//!             });
//!         });
//!     })
//!     .expect("declarations are valid");
//! std::process::exit(i32::from(!report.success()));
//! ```

mod capture;
pub mod config;
mod context;
pub mod error;
pub mod measure;
pub mod node;
mod node_runner;
pub mod outcome;
pub mod output;
pub mod reporter;
pub mod resolve;
mod runner;
mod suite;
pub mod tree;

mod report;
pub use report::*;

#[cfg(test)]
mod test_support;

pub use config::{Partition, SuiteConfig};
pub use context::{Done, SpecContext};
pub use error::{ConfigError, ConfigurationError, ReporterError, WireError};
pub use measure::{Benchmarker, Measurement, MeasurementKind};
pub use node::{Flag, HookKind, Interrupt, Location, NodeResult};
pub use outcome::{Failure, FailureKind, Outcome, SpecHeader, SpecState, SuiteSummary};
pub use reporter::{ConsoleReporter, Dispatcher, Reporter};
pub use suite::Suite;
pub use tree::{SpecTree, TreeBuilder};
