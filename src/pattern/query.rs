//! Links and decisions exposed by each pattern node.
//!
//! [`PatternQuery`] is the subject-independent shape: which children are
//! linked, how, and how many decisions the node takes. [`run_decided_query`]
//! checks one subject locally and fills the same links with the subject
//! material each child must match, taking its decisions from the
//! [`Conjecture`].

use crate::engine::conjecture::Conjecture;
use crate::engine::coupling::{Key, Run};
use crate::engine::errors::{EngineError, Mismatch, Outcome};
use crate::engine::orchestrator::SearchContext;
use crate::pattern::agent::{Agent, PatternId, PatternSet};
use crate::tree::{Forest, KindId, Member, NodeId, Site, Value};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Must match for the parent to match.
    Normal,
    /// Evaluated in its own region and combined by the parent's evaluator.
    Abnormal,
    /// A star standing for a run of container elements.
    Multiplicity,
}

/// How the outcomes of a node's abnormal links combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluator {
    And,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternLink {
    pub slot: usize,
    pub target: PatternId,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternQuery {
    pub links: Vec<PatternLink>,
    pub decisions: usize,
    pub evaluator: Option<Evaluator>,
}

impl PatternQuery {
    fn link(&mut self, slot: usize, target: PatternId, kind: LinkKind) {
        self.links.push(PatternLink { slot, target, kind });
    }
}

/// Link slots taken by a member of a standard pattern. A single member
/// always takes one, so holes do not shift the slots after them.
fn width(member: &Member<PatternId>) -> usize {
    match member {
        Member::Single(_) => 1,
        Member::Sequence(items) | Member::Collection(items) => items.len(),
    }
}

pub(crate) fn structural_query(patterns: &PatternSet, id: PatternId) -> PatternQuery {
    let mut query = PatternQuery::default();
    match &patterns.get(id).agent {
        Agent::Standard { members, .. } => {
            let mut slot = 0;
            for member in members {
                for (offset, child) in member.children().iter().enumerate() {
                    let kind = if patterns.is_star(*child) {
                        LinkKind::Multiplicity
                    } else {
                        LinkKind::Normal
                    };
                    query.link(slot + offset, *child, kind);
                }
                slot += width(member);
                query.decisions += match member {
                    Member::Single(_) => 0,
                    // A trailing star takes whatever is left.
                    Member::Sequence(items) => items
                        .iter()
                        .enumerate()
                        .filter(|(i, p)| patterns.is_star(**p) && i + 1 < items.len())
                        .count(),
                    Member::Collection(items) => {
                        items.iter().filter(|p| !patterns.is_star(**p)).count()
                    }
                };
            }
        }
        Agent::Star { restriction } => {
            if let Some(restriction) = restriction {
                query.link(0, *restriction, LinkKind::Abnormal);
            }
            query.evaluator = Some(Evaluator::And);
        }
        Agent::Stuff {
            terminus,
            recurse_restriction,
        } => {
            query.link(0, *terminus, LinkKind::Normal);
            if let Some(restriction) = recurse_restriction {
                query.link(1, *restriction, LinkKind::Abnormal);
            }
            query.decisions = 1;
            query.evaluator = Some(Evaluator::And);
        }
        Agent::AnyNode { terminus } => {
            query.link(0, *terminus, LinkKind::Normal);
            query.decisions = 1;
        }
        Agent::Overlay { through, .. }
        | Agent::GreenGrass { through }
        | Agent::Slave { through, .. } => query.link(0, *through, LinkKind::Normal),
        Agent::NotMatch { pattern } => {
            query.link(0, *pattern, LinkKind::Abnormal);
            query.evaluator = Some(Evaluator::Not);
        }
        Agent::MatchAll { patterns: all } => {
            for (slot, p) in all.iter().enumerate() {
                query.link(slot, *p, LinkKind::Normal);
            }
        }
        Agent::MatchAny { patterns: any } => {
            for (slot, p) in any.iter().enumerate() {
                query.link(slot, *p, LinkKind::Normal);
            }
            query.decisions = 1;
        }
    }
    query
}

/// A link filled with the subject material its target must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecidedLink {
    pub slot: usize,
    pub target: PatternId,
    pub kind: LinkKind,
    pub key: Key,
}

impl DecidedLink {
    fn node(slot: usize, target: PatternId, kind: LinkKind, node: NodeId) -> Self {
        Self {
            slot,
            target,
            kind,
            key: Key::Node(node),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecidedQuery {
    pub links: Vec<DecidedLink>,
    pub evaluator: Option<Evaluator>,
    /// Sites from the subject down to the chosen terminus of a `Stuff` or
    /// `AnyNode`.
    pub path: Option<Vec<Site>>,
}

/// Counts the decisions a query takes so a failed query can still take
/// exactly as many as it declares.
struct Decider<'c> {
    conjecture: &'c mut Conjecture,
    used: usize,
}

impl Decider<'_> {
    fn decide(&mut self, range: Range<usize>) -> Result<usize, EngineError> {
        self.used += 1;
        self.conjecture.get_decision(range)
    }

    fn pad(&mut self, declared: usize) -> Result<(), EngineError> {
        while self.used < declared {
            self.decide(0..1)?;
        }
        Ok(())
    }
}

/// Match `key` locally against `pattern` and decide its links.
pub fn run_decided_query(
    ctx: &SearchContext<'_>,
    conjecture: &mut Conjecture,
    pattern: PatternId,
    key: &Key,
) -> Result<Outcome<DecidedQuery>, EngineError> {
    let declared = ctx.patterns.query(pattern);
    let mut decider = Decider {
        conjecture,
        used: 0,
    };
    let mut links = Vec::with_capacity(declared.links.len());
    let mut path = None;

    let outcome = decide_links(ctx, &mut decider, pattern, key, &mut links, &mut path)?;
    if outcome.is_err() {
        decider.pad(declared.decisions)?;
    }
    Ok(outcome.map(|()| DecidedQuery {
        links,
        evaluator: declared.evaluator,
        path,
    }))
}

fn decide_links(
    ctx: &SearchContext<'_>,
    decider: &mut Decider<'_>,
    pattern: PatternId,
    key: &Key,
    links: &mut Vec<DecidedLink>,
    path: &mut Option<Vec<Site>>,
) -> Result<Outcome, EngineError> {
    let node = ctx.patterns.get(pattern);
    let x = match (&node.agent, key) {
        (Agent::Star { restriction }, Key::Run(run)) => {
            return Ok(star_links(ctx.forest, node.kind, *restriction, run, links))
        }
        (Agent::Star { .. }, Key::Node(_)) | (_, Key::Run(_)) => {
            return Err(EngineError::KeyShape { pattern })
        }
        (_, Key::Node(x)) => *x,
    };
    if !ctx.forest.schema().is_subkind(ctx.forest.kind(x), node.kind) {
        return Ok(Err(Mismatch::Local));
    }

    match &node.agent {
        Agent::Standard { value, members } => {
            return standard_links(ctx, decider, pattern, node.kind, x, value, members, links)
        }
        Agent::Star { .. } => return Err(EngineError::KeyShape { pattern }),
        Agent::Stuff {
            terminus,
            recurse_restriction,
        } => {
            let walk = ctx.walk(x);
            let choice = decider.decide(0..walk.len())?;
            links.push(DecidedLink::node(
                0,
                *terminus,
                LinkKind::Normal,
                walk[choice].node,
            ));
            let sites = Forest::path(&walk, choice);
            if let Some(restriction) = recurse_restriction {
                for site in sites.iter().take(sites.len().saturating_sub(1)) {
                    links.push(DecidedLink::node(
                        1,
                        *restriction,
                        LinkKind::Abnormal,
                        site.node,
                    ));
                }
            }
            *path = Some(sites);
        }
        Agent::AnyNode { terminus } => {
            let walk = ctx.walk(x);
            let children: Vec<usize> = walk
                .iter()
                .enumerate()
                .filter(|(_, site)| site.parent == Some(0))
                .map(|(index, _)| index)
                .collect();
            if children.is_empty() {
                return Ok(Err(Mismatch::Size));
            }
            let choice = children[decider.decide(0..children.len())?];
            links.push(DecidedLink::node(
                0,
                *terminus,
                LinkKind::Normal,
                walk[choice].node,
            ));
            *path = Some(Forest::path(&walk, choice));
        }
        Agent::GreenGrass { through } => {
            if ctx.is_dirty(x) {
                return Ok(Err(Mismatch::Local));
            }
            links.push(DecidedLink::node(0, *through, LinkKind::Normal, x));
        }
        Agent::Overlay { through, .. } | Agent::Slave { through, .. } => {
            links.push(DecidedLink::node(0, *through, LinkKind::Normal, x));
        }
        Agent::NotMatch { pattern } => {
            links.push(DecidedLink::node(0, *pattern, LinkKind::Abnormal, x));
        }
        Agent::MatchAll { patterns } => {
            for (slot, p) in patterns.iter().enumerate() {
                links.push(DecidedLink::node(slot, *p, LinkKind::Normal, x));
            }
        }
        Agent::MatchAny { patterns } => {
            let slot = decider.decide(0..patterns.len())?;
            links.push(DecidedLink::node(slot, patterns[slot], LinkKind::Normal, x));
        }
    }
    Ok(Ok(()))
}

fn star_links(
    forest: &Forest,
    kind: KindId,
    restriction: Option<PatternId>,
    run: &Run,
    links: &mut Vec<DecidedLink>,
) -> Outcome {
    let schema = forest.schema();
    if !run
        .items
        .iter()
        .all(|item| schema.is_subkind(forest.kind(*item), kind))
    {
        return Err(Mismatch::Local);
    }
    if let Some(restriction) = restriction {
        links.extend(
            run.items
                .iter()
                .map(|item| DecidedLink::node(0, restriction, LinkKind::Abnormal, *item)),
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn standard_links(
    ctx: &SearchContext<'_>,
    decider: &mut Decider<'_>,
    pattern: PatternId,
    kind: KindId,
    x: NodeId,
    value: &Option<Value>,
    members: &[Member<PatternId>],
    links: &mut Vec<DecidedLink>,
) -> Result<Outcome, EngineError> {
    if value.is_some() && ctx.forest.get(x).value != *value {
        return Ok(Err(Mismatch::Local));
    }
    let subject = ctx
        .forest
        .itemise_as(x, kind)
        .ok_or(EngineError::Itemise { pattern, node: x })?;

    let mut slot = 0;
    for (p, s) in members.iter().zip(subject) {
        let outcome = match (p, s) {
            (Member::Single(None), Member::Single(_)) => Ok(()),
            (Member::Single(Some(_)), Member::Single(None)) => Err(Mismatch::Local),
            (Member::Single(Some(p)), Member::Single(Some(c))) => {
                links.push(DecidedLink::node(slot, *p, LinkKind::Normal, *c));
                Ok(())
            }
            (Member::Sequence(ps), Member::Sequence(xs)) => {
                sequence_links(ctx, decider, slot, ps, xs, links)?
            }
            (Member::Collection(ps), Member::Collection(xs)) => {
                collection_links(ctx, decider, slot, ps, xs, links)?
            }
            _ => return Err(EngineError::Itemise { pattern, node: x }),
        };
        if outcome.is_err() {
            return Ok(outcome);
        }
        slot += width(p);
    }
    Ok(Ok(()))
}

fn sequence_links(
    ctx: &SearchContext<'_>,
    decider: &mut Decider<'_>,
    base: usize,
    ps: &[PatternId],
    xs: &[NodeId],
    links: &mut Vec<DecidedLink>,
) -> Result<Outcome, EngineError> {
    let is_star = |p: &PatternId| ctx.patterns.is_star(*p);
    let mut xit = 0;

    for (i, p) in ps.iter().enumerate() {
        let slot = base + i;
        if !is_star(p) {
            let Some(child) = xs.get(xit) else {
                return Ok(Err(Mismatch::Size));
            };
            links.push(DecidedLink::node(slot, *p, LinkKind::Normal, *child));
            xit += 1;
            continue;
        }

        let end = if i + 1 == ps.len() {
            xs.len()
        } else {
            // Leave room for every non-star element still to come.
            let fixed_after = ps[i + 1..].iter().filter(|q| !is_star(*q)).count();
            match xs.len().checked_sub(fixed_after) {
                Some(max_end) if max_end >= xit => decider.decide(xit..max_end + 1)?,
                _ => return Ok(Err(Mismatch::Size)),
            }
        };
        links.push(DecidedLink {
            slot,
            target: *p,
            kind: LinkKind::Multiplicity,
            key: Key::Run(Run {
                ordered: true,
                items: xs[xit..end].to_vec(),
            }),
        });
        xit = end;
    }

    if xit == xs.len() {
        Ok(Ok(()))
    } else {
        Ok(Err(Mismatch::Size))
    }
}

fn collection_links(
    ctx: &SearchContext<'_>,
    decider: &mut Decider<'_>,
    base: usize,
    ps: &[PatternId],
    xs: &[NodeId],
    links: &mut Vec<DecidedLink>,
) -> Result<Outcome, EngineError> {
    let star = ps
        .iter()
        .enumerate()
        .find(|(_, p)| ctx.patterns.is_star(**p));
    let fixed = ps.len() - usize::from(star.is_some());
    let sized = match star {
        Some(_) => xs.len() >= fixed,
        None => xs.len() == fixed,
    };
    if !sized {
        return Ok(Err(Mismatch::Size));
    }

    let mut remaining = xs.to_vec();
    for (i, p) in ps.iter().enumerate() {
        if ctx.patterns.is_star(*p) {
            continue;
        }
        let choice = decider.decide(0..remaining.len())?;
        let child = remaining.remove(choice);
        links.push(DecidedLink::node(base + i, *p, LinkKind::Normal, child));
    }

    if let Some((i, p)) = star {
        links.push(DecidedLink {
            slot: base + i,
            target: *p,
            kind: LinkKind::Multiplicity,
            key: Key::Run(Run {
                ordered: false,
                items: remaining,
            }),
        });
    }
    Ok(Ok(()))
}
