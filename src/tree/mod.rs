//! Node model shared by subject and pattern trees.
//!
//! Subject trees live in a [`Forest`] arena and are compared structurally by
//! [`compare`]. The [`Schema`] names the kinds both kinds of tree are built
//! from.

pub mod compare;
pub mod errors;
pub mod forest;
pub mod schema;
pub mod spec;

pub use compare::{compare, compare_runs, equal};
pub use errors::SchemaError;
pub use forest::{Forest, Member, Node, NodeId, SExpr, Site, Value};
pub use schema::{Category, KindId, MemberDecl, Schema};
pub use spec::{TreeMember, TreeSpec};
