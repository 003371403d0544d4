//! Two-pass search.
//!
//! Every attempt walks the pattern from the root of its plan:
//!
//! 1. Keying: depth first along normal links. A keyer link couples its
//!    target and recurses. Residual links, star runs and abnormal regions
//!    are set aside.
//! 2. Restricting: star runs are coupled, residual links are compared with
//!    their couplings, and every abnormal region is resolved by a nested
//!    orchestrator and combined by its node's evaluator.
//!
//! Any mismatch ends the attempt. The conjecture then moves on and the walk
//! restarts from the root, replaying every decision it has not changed.

use crate::engine::conjecture::Conjecture;
use crate::engine::coupling::{CouplingView, Couplings, Key};
use crate::engine::errors::{try_match, EngineError, Mismatch, Outcome};
use crate::engine::plan::{LinkId, Plan};
use crate::pattern::{run_decided_query, DecidedLink, Evaluator, LinkKind, PatternId, PatternSet};
use crate::tree::{Forest, NodeId, Site};
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Read-only state shared by every orchestrator of one search.
pub struct SearchContext<'a> {
    pub forest: &'a Forest,
    pub patterns: &'a PatternSet,
    watermark: usize,
    walks: RefCell<HashMap<NodeId, Rc<[Site]>>>,
}

impl<'a> SearchContext<'a> {
    /// Nodes at or above index `watermark` count as dirty.
    pub fn new(forest: &'a Forest, patterns: &'a PatternSet, watermark: usize) -> Self {
        Self {
            forest,
            patterns,
            watermark,
            walks: RefCell::new(HashMap::new()),
        }
    }

    /// True for nodes built since the current run started.
    pub fn is_dirty(&self, node: NodeId) -> bool {
        node.index() >= self.watermark
    }

    /// Preorder walk of `root`, computed once per search.
    pub fn walk(&self, root: NodeId) -> Rc<[Site]> {
        self.walks
            .borrow_mut()
            .entry(root)
            .or_insert_with(|| self.forest.preorder(root).into())
            .clone()
    }
}

struct Pending {
    scope: usize,
    link: LinkId,
    target: PatternId,
    key: Key,
}

struct Region {
    scope: usize,
    pattern: PatternId,
    evaluator: Evaluator,
    links: Vec<DecidedLink>,
}

/// State of one attempt.
#[derive(Default)]
struct Walk {
    couplings: Couplings,
    residuals: Vec<(PatternId, Key)>,
    multiplicities: Vec<Pending>,
    regions: Vec<Region>,
}

pub struct Orchestrator<'p> {
    plan: &'p Plan,
    conjecture: Conjecture,
}

impl<'p> Orchestrator<'p> {
    pub fn new(plan: &'p Plan) -> Self {
        Self {
            plan,
            conjecture: Conjecture::new(),
        }
    }

    /// Find the first combination of decisions under which the plan's
    /// pattern matches `subject`.
    ///
    /// `master` holds the couplings of enclosing searches. Returns the
    /// couplings made here, or `None` once every combination failed.
    pub fn compare(
        &mut self,
        ctx: &SearchContext<'_>,
        subject: &Key,
        master: &CouplingView<'_>,
    ) -> Result<Option<Couplings>, EngineError> {
        self.conjecture = Conjecture::new();
        loop {
            self.conjecture.start();
            match self.attempt(ctx, subject, master)? {
                Ok(couplings) => {
                    self.conjecture.report_outcome(true);
                    return Ok(Some(couplings));
                }
                Err(mismatch) => {
                    trace!("attempt failed: {mismatch:?}");
                    self.conjecture.report_outcome(false);
                    if !self.conjecture.increment() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn attempt(
        &mut self,
        ctx: &SearchContext<'_>,
        subject: &Key,
        master: &CouplingView<'_>,
    ) -> Result<Outcome<Couplings>, EngineError> {
        let mut walk = Walk::default();
        try_match!(self.key(ctx, &mut walk, 0, LinkId::Root, self.plan.root(), subject));
        try_match!(self.restrict(ctx, &mut walk, master));
        Ok(Ok(walk.couplings))
    }

    /// Pass 1.
    fn key(
        &mut self,
        ctx: &SearchContext<'_>,
        walk: &mut Walk,
        scope: usize,
        link: LinkId,
        target: PatternId,
        subject: &Key,
    ) -> Result<Outcome, EngineError> {
        let plan = self.plan;
        let current = plan.scope(scope);
        if !current.is_keyer(link) {
            walk.residuals.push((target, subject.clone()));
            return Ok(Ok(()));
        }

        walk.couplings.key_coupling(target, subject.clone())?;
        let mut query = try_match!(run_decided_query(
            ctx,
            &mut self.conjecture,
            target,
            subject
        ));
        if let Some(path) = query.path.take() {
            walk.couplings.record_path(target, path);
        }

        let mut abnormal = Vec::new();
        for decided in query.links {
            let id = LinkId::Child(target, decided.slot);
            match decided.kind {
                LinkKind::Normal => {
                    let next = current.disjunct(target, decided.slot).unwrap_or(scope);
                    try_match!(self.key(ctx, walk, next, id, decided.target, &decided.key));
                }
                LinkKind::Multiplicity => walk.multiplicities.push(Pending {
                    scope,
                    link: id,
                    target: decided.target,
                    key: decided.key,
                }),
                LinkKind::Abnormal => abnormal.push(decided),
            }
        }

        if let Some(evaluator) = query.evaluator {
            if !abnormal.is_empty() || evaluator == Evaluator::Not {
                walk.regions.push(Region {
                    scope,
                    pattern: target,
                    evaluator,
                    links: abnormal,
                });
            }
        }
        Ok(Ok(()))
    }

    /// Pass 2.
    fn restrict(
        &mut self,
        ctx: &SearchContext<'_>,
        walk: &mut Walk,
        master: &CouplingView<'_>,
    ) -> Result<Outcome, EngineError> {
        let plan = self.plan;

        for pending in std::mem::take(&mut walk.multiplicities) {
            if !plan.scope(pending.scope).is_keyer(pending.link) {
                walk.residuals.push((pending.target, pending.key));
                continue;
            }
            walk.couplings
                .key_coupling(pending.target, pending.key.clone())?;
            let query = try_match!(run_decided_query(
                ctx,
                &mut self.conjecture,
                pending.target,
                &pending.key
            ));
            if let Some(evaluator) = query.evaluator {
                walk.regions.push(Region {
                    scope: pending.scope,
                    pattern: pending.target,
                    evaluator,
                    links: query.links,
                });
            }
        }

        for (target, key) in &walk.residuals {
            try_match!(master.compare_coupling(ctx.forest, &walk.couplings, *target, key));
        }

        let view = master.with(&walk.couplings);
        for region in &walk.regions {
            if !Self::evaluate(ctx, plan, region, &view)? {
                return Ok(Err(Mismatch::Local));
            }
        }
        Ok(Ok(()))
    }

    fn evaluate(
        ctx: &SearchContext<'_>,
        plan: &Plan,
        region: &Region,
        view: &CouplingView<'_>,
    ) -> Result<bool, EngineError> {
        let scope = plan.scope(region.scope);
        let mut all = true;
        for link in &region.links {
            let nested = scope
                .nested(region.pattern, link.slot)
                .ok_or(EngineError::MissingPlan {
                    pattern: region.pattern,
                    slot: link.slot,
                })?;
            let matched = Orchestrator::new(nested)
                .compare(ctx, &link.key, view)?
                .is_some();
            if !matched {
                all = false;
                break;
            }
        }
        Ok(match region.evaluator {
            Evaluator::And => all,
            Evaluator::Not => !all,
        })
    }
}
