pub mod compile;
pub mod loader;
pub mod schema;

pub use compile::{build_schema, CompileError, CompiledRule, RuleSet};
pub use loader::{compile_from_path, compile_from_str, load_from_path, load_from_str, ConfigError};
pub use schema::{
    suggest, AgentSpec, KindSpec, MemberPattern, MemberSpec, Metadata, PatternSpec, RuleFile,
    RuleSpec, ValidationError, ValidationIssue,
};
