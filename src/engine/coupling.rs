//! Couplings: what each pattern node was bound to.
//!
//! A coupling is keyed once per attempt by the pattern node's keyer link.
//! Every other link reaching the node only restricts: its subject must be
//! structurally equal to the key.

use crate::engine::errors::{EngineError, Mismatch, Outcome};
use crate::pattern::PatternId;
use crate::tree::{compare, compare_runs, Forest, NodeId, Site};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A span of container elements matched by a star.
///
/// Runs are values, not forest nodes, so searching never writes to the
/// forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub ordered: bool,
    pub items: Vec<NodeId>,
}

/// What a pattern node is coupled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Node(NodeId),
    Run(Run),
}

impl Key {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Key::Node(id) => Some(*id),
            Key::Run(_) => None,
        }
    }

    /// Structural comparison. Nodes sort before runs.
    pub fn compare(&self, forest: &Forest, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Node(a), Key::Node(b)) => compare(forest, *a, *b),
            (Key::Run(a), Key::Run(b)) => a
                .ordered
                .cmp(&b.ordered)
                .then_with(|| compare_runs(forest, a.ordered, &a.items, &b.items)),
            (Key::Node(_), Key::Run(_)) => Ordering::Less,
            (Key::Run(_), Key::Node(_)) => Ordering::Greater,
        }
    }
}

/// Couplings made by one search attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Couplings {
    keys: HashMap<PatternId, Key>,
    /// Sites from the key down to the chosen terminus, for `Stuff` and
    /// `AnyNode`.
    paths: HashMap<PatternId, Vec<Site>>,
}

impl Couplings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_coupling(&mut self, pattern: PatternId, key: Key) -> Result<(), EngineError> {
        if self.keys.contains_key(&pattern) {
            return Err(EngineError::KeyedTwice { pattern });
        }
        self.keys.insert(pattern, key);
        Ok(())
    }

    pub fn get(&self, pattern: PatternId) -> Option<&Key> {
        self.keys.get(&pattern)
    }

    pub fn record_path(&mut self, pattern: PatternId, path: Vec<Site>) {
        self.paths.insert(pattern, path);
    }

    pub fn path(&self, pattern: PatternId) -> Option<&[Site]> {
        self.paths.get(&pattern).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatternId, &Key)> {
        self.keys.iter().map(|(p, k)| (*p, k))
    }
}

/// Read-only stack of couplings made by enclosing searches, innermost last.
#[derive(Debug, Clone, Default)]
pub struct CouplingView<'a> {
    layers: Vec<&'a Couplings>,
}

impl<'a> CouplingView<'a> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// This view with `top` stacked over it.
    pub fn with<'b>(&self, top: &'b Couplings) -> CouplingView<'b>
    where
        'a: 'b,
    {
        let mut layers: Vec<&'b Couplings> = self.layers.clone();
        layers.push(top);
        CouplingView { layers }
    }

    pub fn get(&self, pattern: PatternId) -> Option<&'a Key> {
        self.layers.iter().rev().find_map(|layer| layer.get(pattern))
    }

    pub fn path(&self, pattern: PatternId) -> Option<&'a [Site]> {
        self.layers.iter().rev().find_map(|layer| layer.path(pattern))
    }

    /// Restrict `pattern` to `key`, looking in `local` first.
    ///
    /// Fails fatally when nothing has keyed `pattern` yet.
    pub fn compare_coupling(
        &self,
        forest: &Forest,
        local: &Couplings,
        pattern: PatternId,
        key: &Key,
    ) -> Result<Outcome, EngineError> {
        let bound = local
            .get(pattern)
            .or_else(|| self.get(pattern))
            .ok_or(EngineError::UnboundResidual { pattern })?;
        if bound.compare(forest, key) == Ordering::Equal {
            Ok(Ok(()))
        } else {
            Ok(Err(Mismatch::Coupling))
        }
    }
}
