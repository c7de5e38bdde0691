use std::{
    panic::{self, AssertUnwindSafe},
    time::Duration,
};

use tracing::debug;

use crate::{
    context::{Done, SpecContext},
    error::ConfigurationError,
    measure::Benchmarker,
    node::{Flag, HookKind, IntoNodeResult, Location, MeasureBody, NodeBody},
    node_runner::payload_as_string,
};

#[derive(Debug)]
pub struct SpecTree {
    pub(crate) root: Grouping,
}

impl SpecTree {
    /// Run `declare` against a fresh builder and return the finished tree.
    pub fn build<F>(declare: F) -> Result<Self, ConfigurationError>
    where
        F: FnOnce(&mut TreeBuilder),
    {
        let mut builder = TreeBuilder::new();
        declare(&mut builder);
        builder.finish()
    }

    pub fn root(&self) -> &Grouping {
        &self.root
    }
}

#[derive(Debug)]
pub struct Grouping {
    pub(crate) text: String,
    pub(crate) flag: Flag,
    pub(crate) location: Location,
    pub(crate) children: Vec<Child>,
    pub(crate) before_each: Vec<Hook>,
    pub(crate) just_before_each: Vec<Hook>,
    pub(crate) after_each: Vec<Hook>,
}

impl Grouping {
    fn new(text: String, flag: Flag, location: Location) -> Self {
        Self {
            text,
            flag,
            location,
            children: Vec::new(),
            before_each: Vec::new(),
            just_before_each: Vec::new(),
            after_each: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn hooks(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::BeforeEach => &self.before_each,
            HookKind::JustBeforeEach => &self.just_before_each,
            HookKind::AfterEach => &self.after_each,
        }
    }

    fn hooks_mut(&mut self, kind: HookKind) -> &mut Vec<Hook> {
        match kind {
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::JustBeforeEach => &mut self.just_before_each,
            HookKind::AfterEach => &mut self.after_each,
        }
    }
}

#[derive(Debug)]
pub enum Child {
    Grouping(Grouping),
    Leaf(Leaf),
}

#[derive(Debug)]
pub struct Hook {
    pub(crate) kind: HookKind,
    pub(crate) body: NodeBody,
    pub(crate) location: Location,
}

impl Hook {
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

#[derive(Debug)]
pub struct Leaf {
    pub(crate) text: String,
    pub(crate) flag: Flag,
    pub(crate) location: Location,
    pub(crate) kind: LeafKind,
}

impl Leaf {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_measurement(&self) -> bool {
        matches!(self.kind, LeafKind::Measure { .. })
    }
}

#[derive(Debug)]
pub(crate) enum LeafKind {
    It(NodeBody),
    Measure { body: MeasureBody, samples: usize },
}

/// Cursor-based builder for a [`SpecTree`].
///
/// The bottom of the cursor is the implicit top-level grouping.
#[derive(Debug)]
pub struct TreeBuilder {
    cursor: Vec<Grouping>,
    error: Option<ConfigurationError>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            cursor: vec![Grouping::new(
                String::new(),
                Flag::None,
                Location::new("<root>", 0),
            )],
            error: None,
        }
    }

    fn finish(mut self) -> Result<SpecTree, ConfigurationError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        match (self.cursor.pop(), self.cursor.is_empty()) {
            (Some(root), true) => Ok(SpecTree { root }),
            _ => Err(ConfigurationError::NoActiveGrouping {
                text: String::new(),
                location: Location::new("<root>", 0),
            }),
        }
    }

    /// Only the first declaration error is kept; it aborts the run.
    fn reject(&mut self, err: ConfigurationError) {
        debug!(%err, "rejected declaration");
        self.error.get_or_insert(err);
    }

    fn current(&mut self, text: &str, location: &Location) -> Option<&mut Grouping> {
        if self.cursor.is_empty() {
            self.reject(ConfigurationError::NoActiveGrouping {
                text: text.to_owned(),
                location: location.clone(),
            });
        }
        self.cursor.last_mut()
    }

    fn check_timeout(&mut self, body: &NodeBody, location: &Location) -> bool {
        match body.timeout() {
            Some(timeout) if timeout.is_zero() => {
                self.reject(ConfigurationError::ZeroTimeout {
                    location: location.clone(),
                });
                false
            }
            _ => true,
        }
    }

    /// Declare a grouping and run `body` to declare its children.
    pub fn push_grouping<F>(
        &mut self,
        text: impl Into<String>,
        flag: Flag,
        location: Location,
        body: F,
    ) -> &mut Self
    where
        F: FnOnce(&mut TreeBuilder),
    {
        let text = text.into();
        self.cursor
            .push(Grouping::new(text.clone(), flag, location.clone()));

        let declared = panic::catch_unwind(AssertUnwindSafe(|| body(self)));

        // Nested groupings catch their own panics, so our grouping is on top again.
        let grouping = self.cursor.pop();
        if let Err(payload) = declared {
            self.reject(ConfigurationError::GroupingPanicked {
                text: text.clone(),
                location: location.clone(),
                message: payload_as_string(payload),
            });
        }

        if let (Some(grouping), Some(parent)) = (grouping, self.current(&text, &location)) {
            parent.children.push(Child::Grouping(grouping));
        }
        self
    }

    pub fn push_leaf(
        &mut self,
        text: impl Into<String>,
        flag: Flag,
        location: Location,
        body: NodeBody,
    ) -> &mut Self {
        let text = text.into();
        if !self.check_timeout(&body, &location) {
            return self;
        }
        if let Some(parent) = self.current(&text, &location) {
            parent.children.push(Child::Leaf(Leaf {
                text,
                flag,
                location,
                kind: LeafKind::It(body),
            }));
        }
        self
    }

    pub fn push_hook(&mut self, kind: HookKind, location: Location, body: NodeBody) -> &mut Self {
        if !self.check_timeout(&body, &location) {
            return self;
        }
        if let Some(parent) = self.current(&kind.to_string(), &location) {
            parent.hooks_mut(kind).push(Hook {
                kind,
                body,
                location,
            });
        }
        self
    }

    pub fn push_measure(
        &mut self,
        text: impl Into<String>,
        flag: Flag,
        location: Location,
        samples: usize,
        body: MeasureBody,
    ) -> &mut Self {
        let text = text.into();
        if samples == 0 && flag != Flag::Pending {
            self.reject(ConfigurationError::ZeroSamples { text, location });
            return self;
        }
        if let Some(parent) = self.current(&text, &location) {
            parent.children.push(Child::Leaf(Leaf {
                text,
                flag,
                location,
                kind: LeafKind::Measure { body, samples },
            }));
        }
        self
    }
}

/// The declaration vocabulary.
///
/// `f` prefixed variants focus, `p` and `x` prefixed variants mark pending.
impl TreeBuilder {
    #[track_caller]
    pub fn describe<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::None, Location::caller(), body)
    }

    #[track_caller]
    pub fn fdescribe<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Focused, Location::caller(), body)
    }

    #[track_caller]
    pub fn pdescribe<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Pending, Location::caller(), body)
    }

    #[track_caller]
    pub fn xdescribe<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Pending, Location::caller(), body)
    }

    #[track_caller]
    pub fn context<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::None, Location::caller(), body)
    }

    #[track_caller]
    pub fn fcontext<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Focused, Location::caller(), body)
    }

    #[track_caller]
    pub fn pcontext<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Pending, Location::caller(), body)
    }

    #[track_caller]
    pub fn xcontext<F: FnOnce(&mut TreeBuilder)>(&mut self, text: &str, body: F) -> &mut Self {
        self.push_grouping(text, Flag::Pending, Location::caller(), body)
    }

    #[track_caller]
    pub fn it<F, R>(&mut self, text: &str, body: F) -> &mut Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        self.push_leaf(text, Flag::None, Location::caller(), NodeBody::sync(body))
    }

    #[track_caller]
    pub fn fit<F, R>(&mut self, text: &str, body: F) -> &mut Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        self.push_leaf(text, Flag::Focused, Location::caller(), NodeBody::sync(body))
    }

    #[track_caller]
    pub fn pit(&mut self, text: &str) -> &mut Self {
        self.push_leaf(text, Flag::Pending, Location::caller(), NodeBody::noop())
    }

    #[track_caller]
    pub fn xit(&mut self, text: &str) -> &mut Self {
        self.push_leaf(text, Flag::Pending, Location::caller(), NodeBody::noop())
    }

    /// An asynchronous leaf under the suite's default timeout.
    #[track_caller]
    pub fn it_async<F, R>(&mut self, text: &str, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(None, body);
        self.push_leaf(text, Flag::None, Location::caller(), body)
    }

    #[track_caller]
    pub fn it_async_timeout<F, R>(&mut self, text: &str, timeout: Duration, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(Some(timeout), body);
        self.push_leaf(text, Flag::None, Location::caller(), body)
    }

    #[track_caller]
    pub fn fit_async<F, R>(&mut self, text: &str, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(None, body);
        self.push_leaf(text, Flag::Focused, Location::caller(), body)
    }

    #[track_caller]
    pub fn before_each<F, R>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        self.push_hook(HookKind::BeforeEach, Location::caller(), NodeBody::sync(body))
    }

    #[track_caller]
    pub fn just_before_each<F, R>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::sync(body);
        self.push_hook(HookKind::JustBeforeEach, Location::caller(), body)
    }

    #[track_caller]
    pub fn after_each<F, R>(&mut self, body: F) -> &mut Self
    where
        F: Fn(&SpecContext) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        self.push_hook(HookKind::AfterEach, Location::caller(), NodeBody::sync(body))
    }

    #[track_caller]
    pub fn before_each_async<F, R>(&mut self, timeout: Option<Duration>, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(timeout, body);
        self.push_hook(HookKind::BeforeEach, Location::caller(), body)
    }

    #[track_caller]
    pub fn just_before_each_async<F, R>(&mut self, timeout: Option<Duration>, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(timeout, body);
        self.push_hook(HookKind::JustBeforeEach, Location::caller(), body)
    }

    #[track_caller]
    pub fn after_each_async<F, R>(&mut self, timeout: Option<Duration>, body: F) -> &mut Self
    where
        F: Fn(SpecContext, Done) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = NodeBody::asynchronous(timeout, body);
        self.push_hook(HookKind::AfterEach, Location::caller(), body)
    }

    /// A leaf whose body runs `samples` times, each time with the hooks around it.
    #[track_caller]
    pub fn measure<F, R>(&mut self, text: &str, samples: usize, body: F) -> &mut Self
    where
        F: Fn(&SpecContext, &mut Benchmarker) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = MeasureBody::new(body);
        self.push_measure(text, Flag::None, Location::caller(), samples, body)
    }

    #[track_caller]
    pub fn fmeasure<F, R>(&mut self, text: &str, samples: usize, body: F) -> &mut Self
    where
        F: Fn(&SpecContext, &mut Benchmarker) -> R + Send + Sync + 'static,
        R: IntoNodeResult,
    {
        let body = MeasureBody::new(body);
        self.push_measure(text, Flag::Focused, Location::caller(), samples, body)
    }

    #[track_caller]
    pub fn pmeasure(&mut self, text: &str) -> &mut Self {
        self.push_measure(text, Flag::Pending, Location::caller(), 0, MeasureBody::noop())
    }

    #[track_caller]
    pub fn xmeasure(&mut self, text: &str) -> &mut Self {
        self.push_measure(text, Flag::Pending, Location::caller(), 0, MeasureBody::noop())
    }
}
