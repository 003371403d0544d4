//! Treegraft: rule-based search and replace over typed trees
//!
//! Subject trees live in a [`Forest`] whose node kinds come from a
//! [`Schema`]. A rule is a pair of pattern trees over the same schema: the
//! search pattern is matched against the subject, every pattern node
//! binds ("couples") to the subject subtree it matched, and the replace
//! pattern is rebuilt from those couplings.
//!
//! # Architecture
//!
//! - [`tree`]: kinds, the node arena and the structural comparator.
//! - [`pattern`]: pattern nodes and the wildcard agents (star, stuff,
//!   overlay, negation, conjunction, disjunction, green grass, slave).
//! - [`engine`]: the backtracking two-pass search and the rebuild.
//! - [`transform`]: repeated application with a repetition cap.
//! - [`config`]: TOML rule files compiled into a schema and rules.
//!
//! The forest is append-only, so unchanged subtrees are shared between the
//! input and every rewritten tree.
//!
//! # Example
//!
//! ```
//! use treegraft::config::compile_from_str;
//! use treegraft::tree::{Forest, TreeSpec};
//!
//! let rules = compile_from_str(
//!     r#"
//! [[kinds]]
//! name = "Expr"
//!
//! [[kinds]]
//! name = "Int"
//! parent = "Expr"
//! value = true
//!
//! [[kinds]]
//! name = "Add"
//! parent = "Expr"
//! members = [{ name = "lhs", category = "single" }, { name = "rhs", category = "single" }]
//!
//! [[rules]]
//! id = "add-zero"
//! search = { agent = "standard", kind = "Add", members = { lhs = { agent = "standard", kind = "Expr", name = "x" }, rhs = { agent = "standard", kind = "Int", value = 0 } } }
//! replace = { agent = "ref", name = "x" }
//! "#,
//! )?;
//!
//! let mut forest = Forest::new(rules.schema.clone());
//! let tree: TreeSpec = serde_json::from_str(
//!     r#"{"kind": "Add", "members": {"lhs": {"kind": "Int", "value": 7}, "rhs": {"kind": "Int", "value": 0}}}"#,
//! )?;
//! let root = forest.import(&tree)?;
//!
//! let rule = &rules.rules[0];
//! let applied = rule.transformation.apply(&mut forest, root, rule.limits)?;
//! assert_eq!(applied.hits, 1);
//! assert_eq!(forest.display(applied.root).to_string(), "(Int 7)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod pattern;
pub mod transform;
pub mod tree;

// Re-exports
pub use config::{
    compile_from_path, compile_from_str, load_from_path, load_from_str, CompileError,
    CompiledRule, ConfigError, RuleFile, RuleSet,
};
pub use engine::{ApplyError, Couplings, EngineError};
pub use pattern::{Agent, Mode, PatternError, PatternId, PatternSet};
pub use transform::{Applied, Limits, Transformation, DEFAULT_MAX_REPETITIONS};
pub use tree::{Forest, NodeId, Schema, SchemaError, TreeSpec, Value};
