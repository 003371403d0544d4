//! Arena of subject nodes.
//!
//! Nodes are immutable once inserted. Rebuilding a tree inserts fresh nodes
//! and shares every untouched subtree by id, so a node reachable from two
//! parents is simply one slot referenced twice.

use crate::tree::errors::SchemaError;
use crate::tree::schema::{Category, KindId, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Index of a node in a [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scalar payload carried by valued kinds (identifiers, literals).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// One itemised member of a node.
///
/// Generic over the id type so that subject nodes (`NodeId`) and pattern
/// nodes (`PatternId`) share the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member<I> {
    Single(Option<I>),
    Sequence(Vec<I>),
    Collection(Vec<I>),
}

impl<I> Member<I> {
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Single => Member::Single(None),
            Category::Sequence => Member::Sequence(Vec::new()),
            Category::Collection => Member::Collection(Vec::new()),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Member::Single(_) => Category::Single,
            Member::Sequence(_) => Category::Sequence,
            Member::Collection(_) => Category::Collection,
        }
    }

    pub fn children(&self) -> &[I] {
        match self {
            Member::Single(child) => child.as_slice(),
            Member::Sequence(items) | Member::Collection(items) => items.as_slice(),
        }
    }
}

/// A subject node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: KindId,
    pub value: Option<Value>,
    pub members: Vec<Member<NodeId>>,
}

/// A node reached by [`Forest::preorder`], with enough context to find its
/// way back to the walk's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub node: NodeId,
    /// Index of the parent's site in the same walk.
    pub parent: Option<usize>,
    /// Member of the parent holding this node.
    pub member: usize,
    /// Position within that member.
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Forest {
    schema: Rc<Schema>,
    nodes: Vec<Node>,
}

impl Forest {
    pub fn new(schema: Rc<Schema>) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
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

    pub fn add(
        &mut self,
        kind: KindId,
        value: Option<Value>,
        members: Vec<Member<NodeId>>,
    ) -> Result<NodeId, SchemaError> {
        self.insert(Node {
            kind,
            value,
            members,
        })
    }

    /// Add a valued node with every member empty.
    pub fn leaf(&mut self, kind: KindId, value: impl Into<Value>) -> Result<NodeId, SchemaError> {
        let members = self.empty_members(kind);
        self.add(kind, Some(value.into()), members)
    }

    /// Add a node without a value.
    pub fn node(
        &mut self,
        kind: KindId,
        members: Vec<Member<NodeId>>,
    ) -> Result<NodeId, SchemaError> {
        self.add(kind, None, members)
    }

    fn empty_members(&self, kind: KindId) -> Vec<Member<NodeId>> {
        self.schema
            .layout(kind)
            .iter()
            .map(|m| Member::empty(m.category))
            .collect()
    }

    /// Validate `node` against the schema and append it.
    pub fn insert(&mut self, node: Node) -> Result<NodeId, SchemaError> {
        self.check(&node)?;
        Ok(self.push(node))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Deep copy of the subtree at `id`. Every node of the copy is new,
    /// including nodes the original reaches more than once.
    pub fn duplicate(&mut self, id: NodeId) -> NodeId {
        let mut node = self.get(id).clone();
        for member in &mut node.members {
            match member {
                Member::Single(child) => {
                    if let Some(child) = child {
                        *child = self.duplicate(*child);
                    }
                }
                Member::Sequence(items) | Member::Collection(items) => {
                    for item in items.iter_mut() {
                        *item = self.duplicate(*item);
                    }
                }
            }
        }
        self.push(node)
    }

    fn check(&self, node: &Node) -> Result<(), SchemaError> {
        let kind_name = || self.schema.name(node.kind).to_string();
        if node.kind.index() >= self.schema.len() {
            return Err(SchemaError::UnknownKind {
                name: format!("#{}", node.kind.index()),
            });
        }
        if node.value.is_some() && !self.schema.is_valued(node.kind) {
            return Err(SchemaError::UnexpectedValue { kind: kind_name() });
        }

        let layout = self.schema.layout(node.kind);
        if layout.len() != node.members.len() {
            return Err(SchemaError::MemberCount {
                kind: kind_name(),
                expected: layout.len(),
                found: node.members.len(),
            });
        }

        for (index, (decl, member)) in layout.iter().zip(&node.members).enumerate() {
            if decl.category != member.category() {
                return Err(SchemaError::MemberCategory {
                    kind: kind_name(),
                    index,
                    expected: decl.category,
                    found: member.category(),
                });
            }
            if let Some(child) = member.children().iter().find(|c| c.index() >= self.nodes.len())
            {
                return Err(SchemaError::UnknownNode { id: child.index() });
            }
            if let Member::Collection(items) = member {
                let mut seen = items.clone();
                seen.sort_unstable();
                seen.dedup();
                if seen.len() != items.len() {
                    return Err(SchemaError::DuplicateInCollection {
                        kind: kind_name(),
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> KindId {
        self.get(id).kind
    }

    /// The members of `id` seen as a node of `kind`.
    ///
    /// Returns `None` when the node is not of `kind` or a sub-kind of it.
    pub fn itemise_as(&self, id: NodeId, kind: KindId) -> Option<&[Member<NodeId>]> {
        let node = self.get(id);
        if !self.schema.is_subkind(node.kind, kind) {
            return None;
        }
        node.members.get(..self.schema.layout(kind).len())
    }

    /// Direct children in member order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.get(id)
            .members
            .iter()
            .flat_map(|m| m.children().iter().copied())
    }

    /// Every node of the subtree rooted at `root`, root first, children in
    /// member order.
    pub fn preorder(&self, root: NodeId) -> Vec<Site> {
        let mut sites = Vec::new();
        let mut stack = vec![Site {
            node: root,
            parent: None,
            member: 0,
            position: 0,
        }];

        while let Some(site) = stack.pop() {
            let index = sites.len();
            sites.push(site);
            let node = self.get(site.node);
            let mut children = Vec::new();
            for (member, m) in node.members.iter().enumerate() {
                for (position, child) in m.children().iter().enumerate() {
                    children.push(Site {
                        node: *child,
                        parent: Some(index),
                        member,
                        position,
                    });
                }
            }
            stack.extend(children.into_iter().rev());
        }
        sites
    }

    /// Sites from `walk[0]` down to `walk[index]`, both included.
    pub fn path(walk: &[Site], index: usize) -> Vec<Site> {
        let mut path = Vec::new();
        let mut current = walk.get(index);
        while let Some(site) = current {
            path.push(*site);
            current = site.parent.and_then(|p| walk.get(p));
        }
        path.reverse();
        path
    }

    /// Insert a copy of `id` whose child at (`member`, `position`) is
    /// replaced by `child`.
    ///
    /// In a collection the replaced slot is dropped instead when `child` is
    /// already present elsewhere in it.
    pub fn with_child(
        &mut self,
        id: NodeId,
        member: usize,
        position: usize,
        child: NodeId,
    ) -> Result<NodeId, SchemaError> {
        let mut node = self.get(id).clone();
        match node.members.get_mut(member) {
            Some(Member::Single(slot)) => *slot = Some(child),
            Some(Member::Sequence(items)) if position < items.len() => items[position] = child,
            Some(Member::Collection(items)) if position < items.len() => {
                if items.iter().enumerate().any(|(i, c)| i != position && *c == child) {
                    items.remove(position);
                } else {
                    items[position] = child;
                }
            }
            _ => {
                return Err(SchemaError::MemberCount {
                    kind: self.schema.name(node.kind).to_string(),
                    expected: member + 1,
                    found: node.members.len(),
                })
            }
        }
        self.insert(node)
    }

    /// S-expression rendering of the subtree at `id`.
    pub fn display(&self, id: NodeId) -> SExpr<'_> {
        SExpr { forest: self, id }
    }
}

/// Compact one-line rendering: `(Kind value member...)`, sequences in
/// brackets, collections in braces, missing children as `_`.
pub struct SExpr<'a> {
    forest: &'a Forest,
    id: NodeId,
}

impl fmt::Display for SExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.forest.get(self.id);
        let name = self.forest.schema.name(node.kind);
        if node.members.is_empty() {
            return match &node.value {
                Some(value) => write!(f, "({name} {value})"),
                None => write!(f, "({name})"),
            };
        }

        write!(f, "({name}")?;
        if let Some(value) = &node.value {
            write!(f, " {value}")?;
        }
        for member in &node.members {
            let (open, close) = match member {
                Member::Single(None) => {
                    write!(f, " _")?;
                    continue;
                }
                Member::Single(Some(child)) => {
                    write!(f, " {}", self.forest.display(*child))?;
                    continue;
                }
                Member::Sequence(_) => ('[', ']'),
                Member::Collection(_) => ('{', '}'),
            };
            write!(f, " {open}")?;
            for (i, child) in member.children().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.forest.display(*child))?;
            }
            write!(f, "{close}")?;
        }
        write!(f, ")")
    }
}
