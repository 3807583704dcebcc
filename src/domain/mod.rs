//! Domain layer: split tree model, invariants and structural edits
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod basis_points;
pub mod document;
pub mod entities;
pub mod error;
pub mod mutation;

pub use arena::{PostOrderIterator, SplitTree, TreeIterator};
pub use document::{BranchDocument, MetadataDocument, TreeDocument};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use mutation::{BranchPatch, RecipientPatch};
