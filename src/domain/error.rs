//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{BranchId, RecipientId};

/// Structural errors: the attempted operation is refused outright.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    #[error("recipient not found: {recipient} in branch {branch}")]
    RecipientNotFound {
        branch: BranchId,
        recipient: RecipientId,
    },

    #[error("branch {0} is not resolvable")]
    NotResolvable(BranchId),

    #[error("the root branch cannot be removed")]
    RootRemoval,

    #[error("branch {child} is not a direct child of {parent}")]
    NotAChild { parent: BranchId, child: BranchId },

    #[error("duplicate branch id: {0}")]
    DuplicateId(BranchId),

    #[error("recipient {recipient} references unknown branch {target}")]
    DanglingReference {
        recipient: RecipientId,
        target: BranchId,
    },

    #[error("branch {branch} declares parent {declared:?}, found under {actual:?}")]
    ParentMismatch {
        branch: BranchId,
        declared: Option<BranchId>,
        actual: Option<BranchId>,
    },

    #[error("reference from {from} to {to} would create a cycle")]
    CycleDetected { from: BranchId, to: BranchId },

    #[error("basis points out of range: {0} (max 10000)")]
    InvalidBasisPoints(u32),

    #[error("invalid recipient {recipient}: {message}")]
    InvalidRecipient {
        recipient: RecipientId,
        message: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
