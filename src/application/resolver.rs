//! Effective share of every payout address in the whole tree
//!
//! The root owns 10000 bp. A branch holding absolute share `S` gives each
//! direct recipient `round(S * bp / 10000)` and passes
//! `round(S * child.bp / 10000)` down to each child branch. Shares of the
//! same address appearing in unrelated branches accumulate.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::domain::basis_points::{apply_share, basis_points_to_percentage, MAX_BASIS_POINTS};
use crate::domain::SplitTree;

/// Absolute basis points per normalized (lower-cased) address.
#[instrument(level = "debug", skip(tree))]
pub fn resolve_basis_points(tree: &SplitTree) -> BTreeMap<String, u64> {
    let mut shares: BTreeMap<String, u64> = BTreeMap::new();
    let mut stack = vec![(tree.root(), MAX_BASIS_POINTS as u64)];

    while let Some((branch, share)) = stack.pop() {
        for recipient in &branch.recipients {
            *shares.entry(recipient.normalized_address()).or_insert(0) +=
                apply_share(share, recipient.basis_points);
        }
        for child in tree.children(&branch.id).unwrap_or_default() {
            stack.push((child, apply_share(share, child.basis_points)));
        }
    }
    shares
}

/// Same as [`resolve_basis_points`], expressed in percent.
pub fn resolve_percentages(tree: &SplitTree) -> BTreeMap<String, f64> {
    resolve_basis_points(tree)
        .into_iter()
        .map(|(address, bp)| (address, basis_points_to_percentage(bp)))
        .collect()
}
