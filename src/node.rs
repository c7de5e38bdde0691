use std::{
    error::Error,
    fmt::{self, Debug, Display},
    panic,
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    context::{Done, SpecContext},
    measure::Benchmarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Flag {
    #[default]
    None,
    Focused,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    BeforeEach,
    JustBeforeEach,
    AfterEach,
}

impl Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::BeforeEach => "BeforeEach",
            HookKind::JustBeforeEach => "JustBeforeEach",
            HookKind::AfterEach => "AfterEach",
        })
    }
}

/// Where a node was declared.
///
/// The runner never looks inside; it only carries the location into
/// failures and headers so reporters can point at the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// The location of whoever called the `#[track_caller]` chain leading here.
    #[track_caller]
    pub fn caller() -> Self {
        let location = panic::Location::caller();
        Self::new(location.file(), location.line())
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Stops a node body early because it failed.
///
/// [`SpecContext::fail`] returns an interrupt for a failure it already
/// recorded. Any [`Error`] converts into an interrupt carrying its message, so
/// bodies can use `?` directly.
pub struct Interrupt(pub(crate) Option<String>);

impl Interrupt {
    pub fn new(message: impl Into<String>) -> Self {
        Self(Some(message.into()))
    }

    pub(crate) fn recorded() -> Self {
        Self(None)
    }
}

impl Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(message) => f.debug_tuple("Interrupt").field(message).finish(),
            None => f.write_str("Interrupt(recorded)"),
        }
    }
}

impl<E: Error> From<E> for Interrupt {
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

pub type NodeResult = Result<(), Interrupt>;

/// Return types a node body may have.
pub trait IntoNodeResult {
    fn into_node_result(self) -> NodeResult;
}

impl IntoNodeResult for () {
    fn into_node_result(self) -> NodeResult {
        Ok(())
    }
}

impl IntoNodeResult for NodeResult {
    fn into_node_result(self) -> NodeResult {
        self
    }
}

pub(crate) type SyncFn = dyn Fn(&SpecContext) -> NodeResult + Send + Sync;
pub(crate) type AsyncFn = dyn Fn(SpecContext, Done) -> NodeResult + Send + Sync;
pub(crate) type MeasureFn = dyn Fn(&SpecContext, &mut Benchmarker) -> NodeResult + Send + Sync;

/// The body of a leaf or hook.
#[non_exhaustive]
pub enum NodeBody {
    /// Runs inline on the runner's thread without any timeout.
    Sync(Box<SyncFn>),

    /// Runs on its own thread and completes by signaling [`Done`].
    ///
    /// `timeout` overrides the suite's default budget.
    Async {
        body: Arc<AsyncFn>,
        timeout: Option<Duration>,
    },
}

impl NodeBody {
    pub fn sync<F, R>(f: F) -> Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        Self::Sync(Box::new(move |ctx: &SpecContext| f(ctx).into_node_result()))
    }

    pub fn asynchronous<F, R>(timeout: Option<Duration>, f: F) -> Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        Self::Async {
            body: Arc::new(move |ctx: SpecContext, done: Done| f(ctx, done).into_node_result()),
            timeout,
        }
    }

    pub(crate) fn noop() -> Self {
        Self::Sync(Box::new(|_: &SpecContext| Ok(())))
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        match self {
            NodeBody::Sync(_) => None,
            NodeBody::Async { timeout, .. } => *timeout,
        }
    }
}

impl Debug for NodeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "Sync(...)"),
            Self::Async { timeout, .. } => f
                .debug_struct("Async")
                .field("timeout", timeout)
                .finish_non_exhaustive(),
        }
    }
}

/// The body of a measurement leaf, invoked once per sample.
pub struct MeasureBody(pub(crate) Box<MeasureFn>);

impl MeasureBody {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&SpecContext, &mut Benchmarker) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        Self(Box::new(
            move |ctx: &SpecContext, benchmarker: &mut Benchmarker| {
                f(ctx, benchmarker).into_node_result()
            },
        ))
    }

    pub(crate) fn noop() -> Self {
        Self(Box::new(|_: &SpecContext, _: &mut Benchmarker| Ok(())))
    }
}

impl Debug for MeasureBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeasureBody(...)")
    }
}
