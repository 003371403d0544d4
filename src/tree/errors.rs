use crate::tree::schema::Category;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("kind '{name}' is already defined")]
    DuplicateKind { name: String },

    #[error("unknown kind '{name}'")]
    UnknownKind { name: String },

    #[error("kind '{kind}' has no member named '{member}'")]
    UnknownMember { kind: String, member: String },

    #[error("member '{member}' of kind '{kind}' is declared twice")]
    DuplicateMember { kind: String, member: String },

    #[error("member {index} of '{kind}' should be a {expected:?}, found {found:?}")]
    MemberCategory {
        kind: String,
        index: usize,
        expected: Category,
        found: Category,
    },

    #[error("kind '{kind}' declares {expected} members, {found} were given")]
    MemberCount {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("kind '{kind}' does not carry a value")]
    UnexpectedValue { kind: String },

    #[error("node #{id} does not exist in this forest")]
    UnknownNode { id: usize },

    #[error("collection member {index} of '{kind}' holds the same node twice")]
    DuplicateInCollection { kind: String, index: usize },
}
