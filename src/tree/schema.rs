//! Kind catalogue shared by subject and pattern trees.
//!
//! A kind has a name, at most one parent, an ordered member layout and an
//! optional scalar value. Layouts are inherited: a child kind's layout starts
//! with its parent's members, so a node of a sub-kind can always be itemised
//! as any of its ancestors by taking a prefix of its members.

use crate::tree::errors::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Dense kind identifier, an index into the [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KindId(u32);

impl KindId {
    /// The root kind. Every kind descends from it and it has no members.
    pub const NODE: KindId = KindId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a member holds its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Zero or one child.
    Single,
    /// Ordered children, duplicates allowed.
    Sequence,
    /// Unordered children, no duplicates by identity.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Clone)]
struct KindDef {
    name: String,
    parent: Option<KindId>,
    layout: Vec<MemberDecl>,
    valued: bool,
}

/// The catalogue of node kinds.
#[derive(Debug, Clone)]
pub struct Schema {
    kinds: Vec<KindDef>,
    by_name: HashMap<String, KindId>,
}

impl Schema {
    /// Name of the root kind.
    pub const ROOT_NAME: &'static str = "Node";

    pub fn new() -> Self {
        let root = KindDef {
            name: Self::ROOT_NAME.to_string(),
            parent: None,
            layout: Vec::new(),
            valued: false,
        };
        let mut by_name = HashMap::new();
        by_name.insert(root.name.clone(), KindId::NODE);
        Self {
            kinds: vec![root],
            by_name,
        }
    }

    /// Define a kind without a value.
    pub fn define(
        &mut self,
        name: &str,
        parent: KindId,
        members: &[(&str, Category)],
    ) -> Result<KindId, SchemaError> {
        self.define_kind(name, parent, members, false)
    }

    /// Define a kind whose nodes carry a scalar [`Value`](crate::tree::Value).
    pub fn define_valued(
        &mut self,
        name: &str,
        parent: KindId,
        members: &[(&str, Category)],
    ) -> Result<KindId, SchemaError> {
        self.define_kind(name, parent, members, true)
    }

    fn define_kind(
        &mut self,
        name: &str,
        parent: KindId,
        members: &[(&str, Category)],
        valued: bool,
    ) -> Result<KindId, SchemaError> {
        if self.by_name.contains_key(name) {
            return Err(SchemaError::DuplicateKind {
                name: name.to_string(),
            });
        }
        let parent_def = self.def(parent).ok_or_else(|| SchemaError::UnknownKind {
            name: format!("#{}", parent.index()),
        })?;

        let mut layout = parent_def.layout.clone();
        for (member, category) in members {
            if layout.iter().any(|m| m.name == *member) {
                return Err(SchemaError::DuplicateMember {
                    kind: name.to_string(),
                    member: member.to_string(),
                });
            }
            layout.push(MemberDecl {
                name: member.to_string(),
                category: *category,
            });
        }

        let id = KindId(self.kinds.len() as u32);
        self.kinds.push(KindDef {
            name: name.to_string(),
            parent: Some(parent),
            layout,
            valued: valued || parent_def.valued,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    fn def(&self, kind: KindId) -> Option<&KindDef> {
        self.kinds.get(kind.index())
    }

    pub fn lookup(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// Like [`Schema::lookup`], failing with [`SchemaError::UnknownKind`].
    pub fn kind(&self, name: &str) -> Result<KindId, SchemaError> {
        self.lookup(name).ok_or_else(|| SchemaError::UnknownKind {
            name: name.to_string(),
        })
    }

    pub fn name(&self, kind: KindId) -> &str {
        self.def(kind).map_or("?", |d| d.name.as_str())
    }

    pub fn parent(&self, kind: KindId) -> Option<KindId> {
        self.def(kind).and_then(|d| d.parent)
    }

    /// Full member layout of `kind`, inherited members first.
    pub fn layout(&self, kind: KindId) -> &[MemberDecl] {
        self.def(kind).map_or(&[], |d| d.layout.as_slice())
    }

    pub fn member_index(&self, kind: KindId, member: &str) -> Option<usize> {
        self.layout(kind).iter().position(|m| m.name == member)
    }

    pub fn is_valued(&self, kind: KindId) -> bool {
        self.def(kind).is_some_and(|d| d.valued)
    }

    /// True when `sub` is `sup` or one of its descendants.
    pub fn is_subkind(&self, sub: KindId, sup: KindId) -> bool {
        let mut current = Some(sub);
        while let Some(kind) = current {
            if kind == sup {
                return true;
            }
            current = self.parent(kind);
        }
        false
    }

    /// Names of all kinds in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Single => write!(f, "single"),
            Category::Sequence => write!(f, "sequence"),
            Category::Collection => write!(f, "collection"),
        }
    }
}
