use regex::Regex;
use tracing::debug;

use crate::{
    config::SuiteConfig,
    error::ConfigurationError,
    node::{Flag, HookKind},
    outcome::SpecHeader,
    tree::{Child, Grouping, Hook, Leaf, SpecTree},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Run,
    Skip,
    Pending,
}

/// A leaf together with everything needed to run it.
#[derive(Debug)]
pub struct Spec<'t> {
    pub(crate) leaf: &'t Leaf,
    /// Outermost first, starting with the implicit top-level grouping.
    pub(crate) ancestors: Vec<&'t Grouping>,
    pub(crate) disposition: Disposition,
    pub(crate) index: usize,
}

impl<'t> Spec<'t> {
    pub fn leaf(&self) -> &'t Leaf {
        self.leaf
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// Position in the resolved plan of the whole tree.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn component_texts(&self) -> Vec<String> {
        self.ancestors
            .iter()
            .skip(1)
            .map(|grouping| grouping.text.clone())
            .collect()
    }

    pub fn header(&self) -> SpecHeader {
        SpecHeader {
            index: self.index,
            component_texts: self.component_texts(),
            text: self.leaf.text.clone(),
            location: self.leaf.location.clone(),
            is_measurement: self.leaf.is_measurement(),
        }
    }

    /// Hooks of `kind` in the order they run.
    ///
    /// Before hooks go outer to inner, after hooks inner to outer. Within one
    /// grouping hooks keep their declaration order.
    pub fn hooks(&self, kind: HookKind) -> Vec<&'t Hook> {
        let per_grouping = self.ancestors.iter().map(|&grouping| grouping.hooks(kind));
        match kind {
            HookKind::BeforeEach | HookKind::JustBeforeEach => {
                per_grouping.flatten().collect()
            }
            HookKind::AfterEach => per_grouping.rev().flatten().collect(),
        }
    }
}

fn is_focused(grouping: &Grouping) -> bool {
    grouping.flag == Flag::Focused
        || grouping.children.iter().any(|child| match child {
            Child::Grouping(grouping) => is_focused(grouping),
            Child::Leaf(leaf) => leaf.flag == Flag::Focused,
        })
}

fn disposition(leaf: &Leaf, ancestors: &[&Grouping], any_focused: bool) -> Disposition {
    let flags = || {
        ancestors
            .iter()
            .map(|grouping| grouping.flag)
            .chain([leaf.flag])
    };

    if flags().any(|flag| flag == Flag::Pending) {
        return Disposition::Pending;
    }
    if any_focused && !flags().any(|flag| flag == Flag::Focused) {
        return Disposition::Skip;
    }
    Disposition::Run
}

fn walk<'t>(
    grouping: &'t Grouping,
    ancestors: &mut Vec<&'t Grouping>,
    any_focused: bool,
    specs: &mut Vec<Spec<'t>>,
) {
    ancestors.push(grouping);
    for child in &grouping.children {
        match child {
            Child::Grouping(inner) => walk(inner, ancestors, any_focused, specs),
            Child::Leaf(leaf) => specs.push(Spec {
                leaf,
                ancestors: ancestors.clone(),
                disposition: disposition(leaf, ancestors, any_focused),
                index: specs.len(),
            }),
        }
    }
    ancestors.pop();
}

/// Decide a disposition for every leaf of `tree`, in depth-first declaration order.
pub fn resolve(tree: &SpecTree) -> Vec<Spec<'_>> {
    let any_focused = is_focused(&tree.root);
    let mut specs = Vec::new();
    walk(&tree.root, &mut Vec::new(), any_focused, &mut specs);
    specs
}

/// The specs one process reports, in order.
#[derive(Debug)]
pub struct RunPlan<'t> {
    pub(crate) specs: Vec<Spec<'t>>,
    pub(crate) total: usize,
}

impl<'t> RunPlan<'t> {
    pub fn specs(&self) -> &[Spec<'t>] {
        &self.specs
    }

    /// Specs across all partitions.
    pub fn total_specs(&self) -> usize {
        self.total
    }

    pub fn specs_to_run(&self) -> usize {
        self.specs
            .iter()
            .filter(|spec| spec.disposition == Disposition::Run)
            .count()
    }
}

fn compile(which: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigurationError> {
    pattern
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
                which,
                pattern: pattern.to_owned(),
                source,
            })
        })
        .transpose()
}

/// Resolve `tree` and narrow it down to what this process runs under `config`.
pub fn plan<'t>(tree: &'t SpecTree, config: &SuiteConfig) -> Result<RunPlan<'t>, ConfigurationError> {
    let focus = compile("focus", config.focus.as_deref())?;
    let skip = compile("skip", config.skip.as_deref())?;

    let mut specs = resolve(tree);
    let total = specs.len();

    for spec in specs.iter_mut() {
        if spec.disposition != Disposition::Run {
            continue;
        }
        let text = spec.header().full_text();
        let unfocused = focus.as_ref().is_some_and(|focus| !focus.is_match(&text));
        let skipped = skip.as_ref().is_some_and(|skip| skip.is_match(&text));
        let measurement = config.skip_measurements && spec.leaf.is_measurement();
        if unfocused || skipped || measurement {
            spec.disposition = Disposition::Skip;
        }
    }

    let range = config.partition.range(total);
    debug!(
        total,
        partition = config.partition.index(),
        of = config.partition.count(),
        ?range,
        "resolved run plan"
    );
    let specs = specs.drain(range).collect();
    Ok(RunPlan { specs, total })
}
