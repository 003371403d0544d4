//! Pattern trees and the links they expose to the engine.

pub mod agent;
pub mod errors;
pub mod query;

pub use agent::{Agent, Mode, PatternId, PatternNode, PatternSet};
pub use errors::PatternError;
pub use query::{
    run_decided_query, DecidedLink, DecidedQuery, Evaluator, LinkKind, PatternLink, PatternQuery,
};
