//! Search and rebuild machinery.
//!
//! An [`Orchestrator`] runs a [`Plan`] against a subject, backtracking
//! through its [`Conjecture`] until the pattern matches or every decision
//! is exhausted. The resulting [`Couplings`] feed the [`Builder`], which
//! produces the replacement subtree.

pub mod builder;
pub mod conjecture;
pub mod coupling;
pub mod errors;
pub mod orchestrator;
pub mod plan;

pub use builder::{Built, Builder};
pub use conjecture::{Conjecture, Decision};
pub use coupling::{CouplingView, Couplings, Key, Run};
pub use errors::{ApplyError, EngineError, Mismatch, Outcome};
pub use orchestrator::{Orchestrator, SearchContext};
pub use plan::{LinkId, Plan, RulePlan, Scope};
