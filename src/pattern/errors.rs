use crate::tree::SchemaError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern node @{id} does not exist")]
    UnknownPattern { id: usize },

    #[error("star @{id} may only appear directly inside a sequence or collection")]
    StarOutsideContainer { id: usize },

    #[error("collection member {index} of '{kind}' holds more than one star")]
    MultipleStarsInCollection { kind: String, index: usize },

    #[error("match-any @{id} needs at least one disjunct")]
    EmptyDisjunction { id: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
