//! Serializable form of subject trees.
//!
//! ```json
//! {"kind": "Add", "members": {"lhs": {"kind": "Int", "value": 1}, "rhs": null}}
//! ```
//!
//! Single members are a nested object (or `null`/absent), sequences and
//! collections are arrays.

use crate::tree::errors::SchemaError;
use crate::tree::forest::{Forest, Member, NodeId, Value};
use crate::tree::schema::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: BTreeMap<String, Option<TreeMember>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeMember {
    Many(Vec<TreeSpec>),
    One(Box<TreeSpec>),
}

impl Forest {
    /// Add the tree described by `spec`, children first.
    pub fn import(&mut self, spec: &TreeSpec) -> Result<NodeId, SchemaError> {
        let kind = self.schema().kind(&spec.kind)?;

        for name in spec.members.keys() {
            if self.schema().member_index(kind, name).is_none() {
                return Err(SchemaError::UnknownMember {
                    kind: spec.kind.clone(),
                    member: name.clone(),
                });
            }
        }

        let layout = self.schema().layout(kind).to_vec();
        let mut members = Vec::with_capacity(layout.len());
        for (index, decl) in layout.iter().enumerate() {
            let given = spec.members.get(&decl.name).and_then(Option::as_ref);
            let member = match (decl.category, given) {
                (category, None) => Member::empty(category),
                (Category::Single, Some(TreeMember::One(child))) => {
                    Member::Single(Some(self.import(child)?))
                }
                (Category::Sequence, Some(TreeMember::Many(items))) => {
                    Member::Sequence(self.import_all(items)?)
                }
                (Category::Collection, Some(TreeMember::Many(items))) => {
                    Member::Collection(self.import_all(items)?)
                }
                (expected, Some(other)) => {
                    return Err(SchemaError::MemberCategory {
                        kind: spec.kind.clone(),
                        index,
                        expected,
                        found: match other {
                            TreeMember::One(_) => Category::Single,
                            TreeMember::Many(_) => Category::Sequence,
                        },
                    })
                }
            };
            members.push(member);
        }

        self.add(kind, spec.value.clone(), members)
    }

    fn import_all(&mut self, items: &[TreeSpec]) -> Result<Vec<NodeId>, SchemaError> {
        items.iter().map(|item| self.import(item)).collect()
    }

    /// Describe the subtree at `id`. Empty members are omitted.
    pub fn export(&self, id: NodeId) -> TreeSpec {
        let node = self.get(id);
        let layout = self.schema().layout(node.kind);
        let mut members = BTreeMap::new();

        for (decl, member) in layout.iter().zip(&node.members) {
            let exported = match member {
                Member::Single(Some(child)) => TreeMember::One(Box::new(self.export(*child))),
                Member::Sequence(items) | Member::Collection(items) if !items.is_empty() => {
                    TreeMember::Many(items.iter().map(|c| self.export(*c)).collect())
                }
                _ => continue,
            };
            members.insert(decl.name.clone(), Some(exported));
        }

        TreeSpec {
            kind: self.schema().name(node.kind).to_string(),
            value: node.value.clone(),
            members,
        }
    }
}
