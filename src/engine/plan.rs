//! Search plans.
//!
//! Planning depends only on the pattern, never on the subject. A breadth
//! first walk over normal and multiplicity links elects, for every pattern
//! node, the first link reaching it as its keyer. Every later link to the
//! same node is residual and only restricts.
//!
//! Each disjunct of a match-any gets its own scope: only one disjunct is
//! ever taken, so none may key on behalf of the others. Abnormal links get
//! a nested plan of their own, run by a nested orchestrator.

use crate::pattern::{Agent, LinkKind, PatternId, PatternSet};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

/// Identity of a link: its source node and slot, or the search root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkId {
    Root,
    Child(PatternId, usize),
}

#[derive(Debug, Default)]
pub struct Scope {
    keyers: HashSet<LinkId>,
    keyed: HashSet<PatternId>,
    disjuncts: HashMap<(PatternId, usize), usize>,
    nested: HashMap<(PatternId, usize), Plan>,
}

impl Scope {
    pub fn is_keyer(&self, link: LinkId) -> bool {
        self.keyers.contains(&link)
    }

    /// Pattern nodes keyed once this scope has been walked, enclosing
    /// scopes and master included.
    pub fn keyed(&self) -> &HashSet<PatternId> {
        &self.keyed
    }

    /// Scope entered through disjunct `slot` of match-any `pattern`.
    pub fn disjunct(&self, pattern: PatternId, slot: usize) -> Option<usize> {
        self.disjuncts.get(&(pattern, slot)).copied()
    }

    /// Plan of the region behind abnormal link `slot` of `pattern`.
    pub fn nested(&self, pattern: PatternId, slot: usize) -> Option<&Plan> {
        self.nested.get(&(pattern, slot))
    }
}

/// Keyer election for one search region. Scope 0 is the region itself,
/// further scopes belong to match-any disjuncts.
#[derive(Debug)]
pub struct Plan {
    root: PatternId,
    scopes: Vec<Scope>,
}

impl Plan {
    /// Plan a search from `root`. Nodes in `master` are already keyed by an
    /// enclosing search.
    pub fn new(patterns: &PatternSet, root: PatternId, master: &HashSet<PatternId>) -> Self {
        let mut plan = Plan {
            root,
            scopes: Vec::new(),
        };
        plan.fill(patterns, master.clone(), vec![(LinkId::Root, root)]);
        plan
    }

    pub fn root(&self) -> PatternId {
        self.root
    }

    pub fn scope(&self, index: usize) -> &Scope {
        &self.scopes[index]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    fn fill(
        &mut self,
        patterns: &PatternSet,
        mut keyed: HashSet<PatternId>,
        seeds: Vec<(LinkId, PatternId)>,
    ) -> usize {
        let index = self.scopes.len();
        self.scopes.push(Scope::default());

        let mut keyers = HashSet::new();
        let mut queue: VecDeque<_> = seeds.into();
        let mut deferred = Vec::new();
        let mut abnormal = Vec::new();

        while let Some((link, target)) = queue.pop_front() {
            if !keyed.insert(target) {
                continue;
            }
            keyers.insert(link);
            let disjunctive = matches!(patterns.get(target).agent, Agent::MatchAny { .. });
            for l in &patterns.query(target).links {
                match l.kind {
                    LinkKind::Abnormal => abnormal.push((target, l.slot, l.target)),
                    _ if disjunctive => deferred.push((target, l.slot, l.target)),
                    _ => queue.push_back((LinkId::Child(target, l.slot), l.target)),
                }
            }
        }

        let mut disjuncts = HashMap::new();
        for (pattern, slot, target) in deferred {
            let seed = vec![(LinkId::Child(pattern, slot), target)];
            let child = self.fill(patterns, keyed.clone(), seed);
            disjuncts.insert((pattern, slot), child);
        }

        let nested = abnormal
            .into_iter()
            .map(|(pattern, slot, target)| ((pattern, slot), Plan::new(patterns, target, &keyed)))
            .collect();

        self.scopes[index] = Scope {
            keyers,
            keyed,
            disjuncts,
            nested,
        };
        index
    }
}

/// Plan of a whole rule: its search plus a plan for every slave its
/// rebuild reaches.
#[derive(Debug)]
pub struct RulePlan {
    pub root: PatternId,
    pub search: Plan,
    pub slaves: HashMap<PatternId, RulePlan>,
}

impl RulePlan {
    pub fn new(patterns: &PatternSet, root: PatternId, master: &HashSet<PatternId>) -> Self {
        let search = Plan::new(patterns, root, master);
        let keyed = search.scope(0).keyed().clone();

        let mut slaves = HashMap::new();
        for slave in rebuilt_slaves(patterns, root) {
            if let Agent::Slave { root: inner, .. } = patterns.get(slave).agent {
                slaves.insert(slave, RulePlan::new(patterns, inner, &keyed));
            }
        }

        debug!(
            "planned {}: {} scope(s), {} nested region(s), {} slave(s)",
            patterns.describe(root),
            search.scopes().len(),
            search.scopes().iter().map(|s| s.nested.len()).sum::<usize>(),
            slaves.len()
        );
        RulePlan {
            root,
            search,
            slaves,
        }
    }
}

/// Slaves the builder reaches from `root`.
fn rebuilt_slaves(patterns: &PatternSet, root: PatternId) -> Vec<PatternId> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match &patterns.get(id).agent {
            Agent::Standard { members, .. } => {
                stack.extend(members.iter().flat_map(|m| m.children().iter().copied()))
            }
            Agent::Overlay { overlay, .. } => stack.push(*overlay),
            Agent::Stuff { terminus, .. } | Agent::AnyNode { terminus } => stack.push(*terminus),
            Agent::GreenGrass { through } => stack.push(*through),
            Agent::Slave { through, .. } => {
                found.push(id);
                stack.push(*through);
            }
            Agent::Star { .. }
            | Agent::NotMatch { .. }
            | Agent::MatchAll { .. }
            | Agent::MatchAny { .. } => {}
        }
    }
    found
}
