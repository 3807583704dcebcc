//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod error;
pub mod error_ext;
pub mod export;
pub mod finalize;
pub mod resolver;
pub mod services;
pub mod session;
pub mod validator;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use export::{export_mapping, MappedRecipient, SplitMapping};
pub use finalize::{
    allocations_for, finalization_order, known_addresses, BranchFailure, FailureCause,
    FinalizationReport, Finalizer,
};
pub use resolver::{resolve_basis_points, resolve_percentages};
pub use session::{SplitSession, TreeEvent};
pub use validator::{validate, ValidationReport};
