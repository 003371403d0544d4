//! Rebuilding the replacement subtree from a complete set of couplings.
//!
//! Every pattern node builds from its own coupling when it has one, from
//! the `base` its parent hands down otherwise. A standard node whose key is
//! of its kind or a sub-kind overlays its specified members onto a copy of
//! the key and deep-duplicates the rest. Without such a key it synthesizes
//! a fresh node from the pattern alone.
//!
//! Replacement material is always new, so every node of it is dirty for the
//! rest of the run. Only the ancestors along a `Stuff` path keep sharing
//! their other children with the subject.

use crate::engine::coupling::{CouplingView, Key, Run};
use crate::engine::errors::{ApplyError, EngineError};
use crate::engine::plan::RulePlan;
use crate::pattern::{Agent, PatternId, PatternSet};
use crate::transform::{repeat, RunContext};
use crate::tree::{Forest, KindId, Member, Node, NodeId, Value};
use std::collections::HashSet;

/// Result of building one pattern node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Built {
    Node(NodeId),
    Run(Run),
}

pub struct Builder<'a> {
    forest: &'a mut Forest,
    patterns: &'a PatternSet,
    couplings: &'a CouplingView<'a>,
    plan: &'a RulePlan,
    run: &'a RunContext,
}

impl<'a> Builder<'a> {
    pub fn new(
        forest: &'a mut Forest,
        patterns: &'a PatternSet,
        couplings: &'a CouplingView<'a>,
        plan: &'a RulePlan,
        run: &'a RunContext,
    ) -> Self {
        Self {
            forest,
            patterns,
            couplings,
            plan,
            run,
        }
    }

    /// Build `pattern` into a single node.
    pub fn build_final(
        &mut self,
        pattern: PatternId,
        base: Option<Key>,
    ) -> Result<NodeId, ApplyError> {
        match self.build(pattern, base)? {
            Built::Node(id) => Ok(id),
            Built::Run(_) => Err(EngineError::NonFinal { pattern }.into()),
        }
    }

    pub fn build(&mut self, pattern: PatternId, base: Option<Key>) -> Result<Built, ApplyError> {
        let patterns = self.patterns;
        let node = patterns.get(pattern);
        let key = self.couplings.get(pattern).cloned().or(base);

        match &node.agent {
            Agent::Standard { value, members } => {
                let id = match key {
                    Some(Key::Node(k))
                        if patterns
                            .schema()
                            .is_subkind(self.forest.kind(k), node.kind) =>
                    {
                        self.overlay(pattern, k, value, members)?
                    }
                    _ => self.synthesize(node.kind, value, members)?,
                };
                Ok(Built::Node(id))
            }
            Agent::Star { .. } => match key {
                Some(Key::Run(run)) => Ok(Built::Run(self.duplicate_run(run))),
                _ => Err(EngineError::UnboundWildcard { pattern }.into()),
            },
            Agent::Stuff { terminus, .. } | Agent::AnyNode { terminus } => {
                Ok(Built::Node(self.rebuild_path(pattern, key, *terminus)?))
            }
            Agent::Overlay { through, overlay } => {
                let base = self.couplings.get(*through).cloned().or(key);
                self.build(*overlay, base)
            }
            Agent::GreenGrass { through } => self.build(*through, key),
            Agent::NotMatch { .. } | Agent::MatchAll { .. } | Agent::MatchAny { .. } => {
                match key {
                    Some(Key::Node(k)) => Ok(Built::Node(self.forest.duplicate(k))),
                    Some(Key::Run(run)) => Ok(Built::Run(self.duplicate_run(run))),
                    None => Err(EngineError::SearchOnly { pattern }.into()),
                }
            }
            Agent::Slave { through, .. } => {
                let built = self.build_final(*through, key)?;
                Ok(Built::Node(self.run_slave(pattern, built)?))
            }
        }
    }

    fn overlay(
        &mut self,
        pattern: PatternId,
        key: NodeId,
        value: &Option<Value>,
        members: &[Member<PatternId>],
    ) -> Result<NodeId, ApplyError> {
        let mut copy = self.forest.get(key).clone();
        if value.is_some() {
            copy.value = value.clone();
        }

        for (index, member) in members.iter().enumerate() {
            let rebuilt = match member {
                Member::Single(None) => match copy.members.get(index) {
                    Some(Member::Single(Some(child))) => {
                        Member::Single(Some(self.forest.duplicate(*child)))
                    }
                    _ => continue,
                },
                Member::Sequence(items) | Member::Collection(items) if items.is_empty() => {
                    match copy.members.get(index) {
                        Some(Member::Sequence(kept)) => Member::Sequence(self.duplicate_all(kept)),
                        Some(Member::Collection(kept)) => {
                            Member::Collection(self.duplicate_all(kept))
                        }
                        _ => continue,
                    }
                }
                Member::Single(Some(p)) => {
                    let base = match copy.members.get(index) {
                        Some(Member::Single(Some(child))) => Some(Key::Node(*child)),
                        _ => None,
                    };
                    Member::Single(Some(self.build_final(*p, base)?))
                }
                Member::Sequence(items) => Member::Sequence(self.build_items(items)?),
                Member::Collection(items) => Member::Collection(dedup(self.build_items(items)?)),
            };
            match copy.members.get_mut(index) {
                Some(slot) => *slot = rebuilt,
                None => return Err(EngineError::Itemise { pattern, node: key }.into()),
            }
        }

        // Members only the key's sub-kind declares.
        for member in copy.members.iter_mut().skip(members.len()) {
            *member = match &*member {
                Member::Single(child) => Member::Single(child.map(|c| self.forest.duplicate(c))),
                Member::Sequence(items) => Member::Sequence(self.duplicate_all(items)),
                Member::Collection(items) => Member::Collection(self.duplicate_all(items)),
            };
        }
        Ok(self.forest.insert(copy)?)
    }

    fn synthesize(
        &mut self,
        kind: KindId,
        value: &Option<Value>,
        members: &[Member<PatternId>],
    ) -> Result<NodeId, ApplyError> {
        let mut built = Vec::with_capacity(members.len());
        for member in members {
            built.push(match member {
                Member::Single(None) => Member::Single(None),
                Member::Single(Some(p)) => Member::Single(Some(self.build_final(*p, None)?)),
                Member::Sequence(items) => Member::Sequence(self.build_items(items)?),
                Member::Collection(items) => Member::Collection(dedup(self.build_items(items)?)),
            });
        }
        Ok(self.forest.insert(Node {
            kind,
            value: value.clone(),
            members: built,
        })?)
    }

    fn build_items(&mut self, items: &[PatternId]) -> Result<Vec<NodeId>, ApplyError> {
        let mut built = Vec::with_capacity(items.len());
        for item in items {
            match self.build(*item, None)? {
                Built::Node(id) => built.push(id),
                Built::Run(run) => built.extend(run.items),
            }
        }
        Ok(built)
    }

    /// Copy the nodes from the key of `pattern` down to the terminus its
    /// search chose, with the rebuilt terminus in place of the old one.
    fn rebuild_path(
        &mut self,
        pattern: PatternId,
        key: Option<Key>,
        terminus: PatternId,
    ) -> Result<NodeId, ApplyError> {
        let Some(Key::Node(top)) = key else {
            return Err(EngineError::UnboundWildcard { pattern }.into());
        };
        let path = self
            .couplings
            .path(pattern)
            .filter(|path| path.first().map(|site| site.node) == Some(top))
            .ok_or(EngineError::TerminusLost { pattern })?;

        let mut current = self.build_final(terminus, None)?;
        for pair in path.windows(2).rev() {
            let (parent, site) = (pair[0], pair[1]);
            current = self
                .forest
                .with_child(parent.node, site.member, site.position, current)?;
        }
        Ok(current)
    }

    fn duplicate_all(&mut self, items: &[NodeId]) -> Vec<NodeId> {
        items.iter().map(|item| self.forest.duplicate(*item)).collect()
    }

    fn duplicate_run(&mut self, run: Run) -> Run {
        Run {
            ordered: run.ordered,
            items: self.duplicate_all(&run.items),
        }
    }

    fn run_slave(&mut self, pattern: PatternId, root: NodeId) -> Result<NodeId, ApplyError> {
        let plan = self
            .plan
            .slaves
            .get(&pattern)
            .ok_or(EngineError::MissingPlan { pattern, slot: 0 })?;
        let run = self.run.nested(&*self.forest);
        let applied = repeat(&mut *self.forest, self.patterns, plan, root, self.couplings, &run)?;
        Ok(applied.root)
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup(mut items: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    items.retain(|id| seen.insert(*id));
    items
}
