//! Repeated search and replace.
//!
//! A [`Transformation`] searches the subject, rebuilds it at the first hit
//! and searches again, until nothing matches or the repetition cap is
//! reached. A rule that still matches once the cap is reached is reported
//! as a possibly infinite rewrite.

use crate::engine::{
    ApplyError, Builder, CouplingView, Couplings, Key, Orchestrator, RulePlan, SearchContext,
};
use crate::pattern::{Mode, PatternError, PatternId, PatternSet};
use crate::tree::{Forest, NodeId};
use log::{debug, warn};
use std::collections::HashSet;
use std::rc::Rc;

pub const DEFAULT_MAX_REPETITIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_repetitions: usize,
    /// Fail instead of warning when the cap is reached.
    pub strict: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub root: NodeId,
    pub hits: usize,
}

/// State of one repeated run.
///
/// Every node appended to the forest after `watermark` was built by this
/// run and is no longer green grass.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub rule: String,
    pub limits: Limits,
    pub watermark: usize,
}

impl RunContext {
    pub fn new(rule: &str, limits: Limits, forest: &Forest) -> Self {
        Self {
            rule: rule.to_string(),
            limits,
            watermark: forest.len(),
        }
    }

    /// Context for a slave run starting now.
    pub fn nested(&self, forest: &Forest) -> Self {
        Self::new(&self.rule, self.limits, forest)
    }
}

/// A compiled rule.
#[derive(Debug)]
pub struct Transformation {
    name: String,
    patterns: PatternSet,
    search: PatternId,
    replace: Option<PatternId>,
    mode: Mode,
    plan: RulePlan,
}

impl Transformation {
    /// Wrap `search` and `replace` into a rule over `patterns` and plan it.
    pub fn new(
        name: impl Into<String>,
        mut patterns: PatternSet,
        search: PatternId,
        replace: Option<PatternId>,
        mode: Mode,
    ) -> Result<Self, PatternError> {
        let root = patterns.wrap(search, replace, mode)?;
        let plan = RulePlan::new(&patterns, root, &HashSet::new());
        Ok(Self {
            name: name.into(),
            patterns,
            search,
            replace,
            mode,
            plan,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn search(&self) -> PatternId {
        self.search
    }

    pub fn replace(&self) -> Option<PatternId> {
        self.replace
    }

    pub fn plan(&self) -> &RulePlan {
        &self.plan
    }

    fn check_schema(&self, forest: &Forest) -> Result<(), ApplyError> {
        if Rc::ptr_eq(forest.schema_rc(), self.patterns.schema_rc()) {
            Ok(())
        } else {
            Err(ApplyError::SchemaMismatch {
                rule: self.name.clone(),
            })
        }
    }

    /// Couplings of the first hit below `root`, without rebuilding.
    pub fn find(&self, forest: &Forest, root: NodeId) -> Result<Option<Couplings>, ApplyError> {
        self.check_schema(forest)?;
        let ctx = SearchContext::new(forest, &self.patterns, forest.len());
        Ok(Orchestrator::new(&self.plan.search).compare(
            &ctx,
            &Key::Node(root),
            &CouplingView::new(),
        )?)
    }

    /// Rewrite `root` until the rule stops matching.
    pub fn apply(
        &self,
        forest: &mut Forest,
        root: NodeId,
        limits: Limits,
    ) -> Result<Applied, ApplyError> {
        self.check_schema(forest)?;
        let run = RunContext::new(&self.name, limits, forest);
        repeat(
            forest,
            &self.patterns,
            &self.plan,
            root,
            &CouplingView::new(),
            &run,
        )
    }
}

/// Search and rebuild `root` with `plan` until it no longer matches.
pub(crate) fn repeat(
    forest: &mut Forest,
    patterns: &PatternSet,
    plan: &RulePlan,
    root: NodeId,
    master: &CouplingView<'_>,
    run: &RunContext,
) -> Result<Applied, ApplyError> {
    let mut root = root;
    let mut hits = 0;

    loop {
        let Some(couplings) = search(forest, patterns, plan, root, master, run)? else {
            debug!("{}: done after {} hit(s)", run.rule, hits);
            return Ok(Applied { root, hits });
        };
        if hits == run.limits.max_repetitions {
            break;
        }

        let view = master.with(&couplings);
        root = Builder::new(forest, patterns, &view, plan, run).build_final(plan.root, None)?;
        hits += 1;
        debug!("{}: hit {} -> {}", run.rule, hits, forest.display(root));
    }

    if run.limits.strict {
        return Err(ApplyError::PossiblyInfinite {
            rule: run.rule.clone(),
            repetitions: hits,
        });
    }
    warn!(
        "{}: still matching after {} repetitions, possibly an infinite rewrite",
        run.rule, hits
    );
    Ok(Applied { root, hits })
}

fn search(
    forest: &Forest,
    patterns: &PatternSet,
    plan: &RulePlan,
    root: NodeId,
    master: &CouplingView<'_>,
    run: &RunContext,
) -> Result<Option<Couplings>, ApplyError> {
    let ctx = SearchContext::new(forest, patterns, run.watermark);
    Ok(Orchestrator::new(&plan.search).compare(&ctx, &Key::Node(root), master)?)
}
