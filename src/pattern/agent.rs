//! Pattern trees.
//!
//! A pattern node pairs a kind with an [`Agent`], the capability that decides
//! how the node matches and how it rebuilds. The kind always acts as a
//! pre-restriction: a subject node only reaches the agent when its kind is
//! the pattern's kind or one of its descendants.
//!
//! Pattern nodes are only ever created children first, so a [`PatternSet`]
//! is a DAG. A node referenced from several places is one node, and the
//! engine requires every subject subtree it meets there to be equal.

use crate::pattern::errors::PatternError;
use crate::pattern::query::{structural_query, PatternQuery};
use crate::tree::{Category, KindId, Member, Schema, SchemaError, Value};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Index of a node in a [`PatternSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(u32);

impl PatternId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Whether a rule looks for its pattern anywhere below the root or only at
/// the root itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Search,
    Compare,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Search => write!(f, "search"),
            Mode::Compare => write!(f, "compare"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Agent {
    /// Ordinary node: optional value restriction and one pattern per member.
    ///
    /// `Single(None)` leaves a single member unconstrained. An empty
    /// container requires an empty subject container while searching and
    /// keeps the subject's container when overlaying.
    Standard {
        value: Option<Value>,
        members: Vec<Member<PatternId>>,
    },
    /// Zero or more elements of the enclosing container.
    Star { restriction: Option<PatternId> },
    /// Any node of the subtree, at any depth, with every node on the way
    /// satisfying `recurse_restriction`.
    Stuff {
        terminus: PatternId,
        recurse_restriction: Option<PatternId>,
    },
    /// Any direct child.
    AnyNode { terminus: PatternId },
    /// Matches through `through`, rebuilds as `overlay` on top of it.
    Overlay {
        through: PatternId,
        overlay: PatternId,
    },
    NotMatch { pattern: PatternId },
    MatchAll { patterns: Vec<PatternId> },
    MatchAny { patterns: Vec<PatternId> },
    /// Only matches nodes that existed before the current run started.
    GreenGrass { through: PatternId },
    /// Matches through `through`. When rebuilt, runs the nested rule rooted
    /// at `root` over the result.
    Slave { through: PatternId, root: PatternId },
}

impl Agent {
    pub fn name(&self) -> &'static str {
        match self {
            Agent::Standard { .. } => "standard",
            Agent::Star { .. } => "star",
            Agent::Stuff { .. } => "stuff",
            Agent::AnyNode { .. } => "any-node",
            Agent::Overlay { .. } => "overlay",
            Agent::NotMatch { .. } => "not-match",
            Agent::MatchAll { .. } => "match-all",
            Agent::MatchAny { .. } => "match-any",
            Agent::GreenGrass { .. } => "green-grass",
            Agent::Slave { .. } => "slave",
        }
    }

    /// Every pattern node this one refers to.
    pub fn children(&self) -> Vec<PatternId> {
        match self {
            Agent::Standard { members, .. } => members
                .iter()
                .flat_map(|m| m.children().iter().copied())
                .collect(),
            Agent::Star { restriction } => restriction.iter().copied().collect(),
            Agent::Stuff {
                terminus,
                recurse_restriction,
            } => std::iter::once(*terminus)
                .chain(recurse_restriction.iter().copied())
                .collect(),
            Agent::AnyNode { terminus } => vec![*terminus],
            Agent::Overlay { through, overlay } => vec![*through, *overlay],
            Agent::NotMatch { pattern } => vec![*pattern],
            Agent::MatchAll { patterns } | Agent::MatchAny { patterns } => patterns.clone(),
            Agent::GreenGrass { through } => vec![*through],
            Agent::Slave { through, root } => vec![*through, *root],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternNode {
    pub kind: KindId,
    pub agent: Agent,
}

/// Arena of pattern nodes for one rule (or one rule file).
#[derive(Debug)]
pub struct PatternSet {
    schema: Rc<Schema>,
    nodes: Vec<PatternNode>,
    queries: Vec<OnceCell<PatternQuery>>,
}

impl PatternSet {
    pub fn new(schema: Rc<Schema>) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_rc(&self) -> &Rc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: PatternId) -> &PatternNode {
        &self.nodes[id.index()]
    }

    pub fn is_star(&self, id: PatternId) -> bool {
        matches!(self.get(id).agent, Agent::Star { .. })
    }

    /// The structural query of `id`, computed on first use.
    pub fn query(&self, id: PatternId) -> &PatternQuery {
        self.queries[id.index()].get_or_init(|| structural_query(self, id))
    }

    /// Short description for logs: `@3 standard Add`.
    pub fn describe(&self, id: PatternId) -> String {
        let node = self.get(id);
        format!(
            "{id} {} {}",
            node.agent.name(),
            self.schema.name(node.kind)
        )
    }

    pub fn standard(
        &mut self,
        kind: KindId,
        members: Vec<Member<PatternId>>,
    ) -> Result<PatternId, PatternError> {
        self.push(
            kind,
            Agent::Standard {
                value: None,
                members,
            },
        )
    }

    pub fn valued(
        &mut self,
        kind: KindId,
        value: impl Into<Value>,
        members: Vec<Member<PatternId>>,
    ) -> Result<PatternId, PatternError> {
        self.push(
            kind,
            Agent::Standard {
                value: Some(value.into()),
                members,
            },
        )
    }

    /// A standard node with every member left unspecified.
    pub fn blank(&mut self, kind: KindId) -> Result<PatternId, PatternError> {
        let members = self
            .schema
            .layout(kind)
            .iter()
            .map(|m| Member::empty(m.category))
            .collect();
        self.standard(kind, members)
    }

    pub fn star(
        &mut self,
        kind: KindId,
        restriction: Option<PatternId>,
    ) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::Star { restriction })
    }

    pub fn stuff(
        &mut self,
        kind: KindId,
        terminus: PatternId,
        recurse_restriction: Option<PatternId>,
    ) -> Result<PatternId, PatternError> {
        self.push(
            kind,
            Agent::Stuff {
                terminus,
                recurse_restriction,
            },
        )
    }

    pub fn any_node(&mut self, kind: KindId, terminus: PatternId) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::AnyNode { terminus })
    }

    pub fn overlay(
        &mut self,
        kind: KindId,
        through: PatternId,
        overlay: PatternId,
    ) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::Overlay { through, overlay })
    }

    pub fn not_match(&mut self, kind: KindId, pattern: PatternId) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::NotMatch { pattern })
    }

    pub fn match_all(
        &mut self,
        kind: KindId,
        patterns: Vec<PatternId>,
    ) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::MatchAll { patterns })
    }

    pub fn match_any(
        &mut self,
        kind: KindId,
        patterns: Vec<PatternId>,
    ) -> Result<PatternId, PatternError> {
        if patterns.is_empty() {
            return Err(PatternError::EmptyDisjunction { id: self.len() });
        }
        self.push(kind, Agent::MatchAny { patterns })
    }

    pub fn green_grass(
        &mut self,
        kind: KindId,
        through: PatternId,
    ) -> Result<PatternId, PatternError> {
        self.push(kind, Agent::GreenGrass { through })
    }

    /// A node matching through `through` whose rebuild runs the rule
    /// `search` => `replace` over the rebuilt subtree.
    pub fn slave(
        &mut self,
        kind: KindId,
        through: PatternId,
        search: PatternId,
        replace: Option<PatternId>,
        mode: Mode,
    ) -> Result<PatternId, PatternError> {
        let root = self.wrap(search, replace, mode)?;
        self.push(kind, Agent::Slave { through, root })
    }

    /// Root of a rule: `Overlay(search, replace)`, under a `Stuff` in
    /// search mode so it can match anywhere in the subject.
    ///
    /// Without a replace pattern the search pattern rebuilds itself, which
    /// applies any overlays it contains.
    pub fn wrap(
        &mut self,
        search: PatternId,
        replace: Option<PatternId>,
        mode: Mode,
    ) -> Result<PatternId, PatternError> {
        let overlay = self.overlay(KindId::NODE, search, replace.unwrap_or(search))?;
        match mode {
            Mode::Compare => Ok(overlay),
            Mode::Search => self.stuff(KindId::NODE, overlay, None),
        }
    }

    fn push(&mut self, kind: KindId, agent: Agent) -> Result<PatternId, PatternError> {
        self.check(kind, &agent)?;
        let id = PatternId(self.nodes.len() as u32);
        self.nodes.push(PatternNode { kind, agent });
        self.queries.push(OnceCell::new());
        Ok(id)
    }

    fn check(&self, kind: KindId, agent: &Agent) -> Result<(), PatternError> {
        if kind.index() >= self.schema.len() {
            return Err(SchemaError::UnknownKind {
                name: format!("#{}", kind.index()),
            }
            .into());
        }
        let children = agent.children();
        if let Some(child) = children.iter().find(|c| c.index() >= self.nodes.len()) {
            return Err(PatternError::UnknownPattern { id: child.index() });
        }

        match agent {
            Agent::Standard { value, members } => self.check_standard(kind, value, members),
            _ => match children.iter().find(|c| self.is_star(**c)) {
                Some(star) => Err(PatternError::StarOutsideContainer { id: star.index() }),
                None => Ok(()),
            },
        }
    }

    fn check_standard(
        &self,
        kind: KindId,
        value: &Option<Value>,
        members: &[Member<PatternId>],
    ) -> Result<(), PatternError> {
        let kind_name = || self.schema.name(kind).to_string();
        if value.is_some() && !self.schema.is_valued(kind) {
            return Err(SchemaError::UnexpectedValue { kind: kind_name() }.into());
        }

        let layout = self.schema.layout(kind);
        if layout.len() != members.len() {
            return Err(SchemaError::MemberCount {
                kind: kind_name(),
                expected: layout.len(),
                found: members.len(),
            }
            .into());
        }

        for (index, (decl, member)) in layout.iter().zip(members).enumerate() {
            if decl.category != member.category() {
                return Err(SchemaError::MemberCategory {
                    kind: kind_name(),
                    index,
                    expected: decl.category,
                    found: member.category(),
                }
                .into());
            }
            let stars = member.children().iter().filter(|c| self.is_star(**c)).count();
            match member.category() {
                Category::Single if stars > 0 => {
                    let star = member.children()[0];
                    return Err(PatternError::StarOutsideContainer { id: star.index() });
                }
                Category::Collection if stars > 1 => {
                    return Err(PatternError::MultipleStarsInCollection {
                        kind: kind_name(),
                        index,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Every pattern node reachable from `root`, `root` first.
    pub fn reachable(&self, root: PatternId) -> Vec<PatternId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.get(id).agent.children().into_iter().rev());
        }
        order
    }
}
