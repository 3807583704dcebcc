//! Hierarchical revenue split trees
//!
//! A split tree distributes 10000 basis points from its root over wallet
//! recipients and nested branches. Each resolvable branch eventually becomes
//! one real address created by an external service, bottom-up.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
