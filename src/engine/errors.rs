use crate::pattern::PatternId;
use crate::tree::{NodeId, SchemaError};
use std::ops::Range;
use thiserror::Error;

/// Why a search attempt failed. Always recoverable by backtracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// Kind, value or local shape disagreement.
    Local,
    /// A pattern node met a subtree unequal to the one it is coupled to.
    Coupling,
    /// Container length disagreement.
    Size,
}

/// Result of one match step.
pub type Outcome<T = ()> = Result<T, Mismatch>;

/// Unwrap a matched step, returning any mismatch to the caller.
macro_rules! try_match {
    ($step:expr) => {
        match $step? {
            Ok(value) => value,
            Err(mismatch) => return Ok(Err(mismatch)),
        }
    };
}
pub(crate) use try_match;

/// Broken invariants. These end the run and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("pattern node {pattern} was keyed twice in one attempt")]
    KeyedTwice { pattern: PatternId },

    #[error("decision {index} changed shape on replay: recorded {recorded:?}, offered {offered:?}")]
    DecisionReshaped {
        index: usize,
        recorded: Range<usize>,
        offered: Range<usize>,
    },

    #[error("residual link reached {pattern} before it was keyed")]
    UnboundResidual { pattern: PatternId },

    #[error("{pattern} rebuilt into a run of nodes where a single node is required")]
    NonFinal { pattern: PatternId },

    #[error("wildcard {pattern} has no coupling to rebuild from")]
    UnboundWildcard { pattern: PatternId },

    #[error("search-only pattern {pattern} has no coupling to rebuild from")]
    SearchOnly { pattern: PatternId },

    #[error("subject {node} cannot be itemised as the kind of {pattern}")]
    Itemise { pattern: PatternId, node: NodeId },

    #[error("{pattern} was offered a run where a node is required, or the reverse")]
    KeyShape { pattern: PatternId },

    #[error("no plan for link {slot} of {pattern}")]
    MissingPlan { pattern: PatternId, slot: usize },

    #[error("terminus of {pattern} is not below the node it was coupled to")]
    TerminusLost { pattern: PatternId },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("rule '{rule}' still matched after {repetitions} repetitions (possibly infinite rewrite)")]
    PossiblyInfinite { rule: String, repetitions: usize },

    #[error("rule '{rule}' was built for a different schema than the subject forest")]
    SchemaMismatch { rule: String },
}

impl From<SchemaError> for ApplyError {
    fn from(err: SchemaError) -> Self {
        ApplyError::Engine(err.into())
    }
}
