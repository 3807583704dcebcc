//! Flat recipient list for a single external computation request

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::resolver::resolve_basis_points;
use crate::application::validator::validate;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::basis_points::{rescale, MAX_BASIS_POINTS};
use crate::domain::{BranchDocument, SplitTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedRecipient {
    pub address: String,
    pub name: String,
    pub basis_points: u32,
}

/// Every payout address with its share of the whole tree, summing to exactly
/// 10000, plus the branch structure for reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitMapping {
    pub recipients: Vec<MappedRecipient>,
    pub tree: BranchDocument,
}

impl SplitMapping {
    pub fn total_basis_points(&self) -> u32 {
        self.recipients.iter().map(|r| r.basis_points).sum()
    }
}

/// Export a tree that passes validation.
///
/// Addresses are keyed case-insensitively; the first name seen for an
/// address wins. Shares come from the resolver and are rescaled to 10000,
/// the rounding remainder going to the largest share.
#[instrument(level = "debug", skip(tree), fields(tree = %tree.metadata.name))]
pub fn export_mapping(tree: &SplitTree) -> ApplicationResult<SplitMapping> {
    let report = validate(tree);
    if !report.valid {
        return Err(ApplicationError::InvalidTree {
            errors: report.errors,
        });
    }

    let shares = resolve_basis_points(tree);
    let mut order: Vec<(String, String)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for branch in tree.iter() {
        for recipient in &branch.recipients {
            let address = recipient.normalized_address();
            if !positions.contains_key(&address) {
                positions.insert(address.clone(), order.len());
                order.push((address, recipient.name.clone()));
            }
        }
    }

    let absolute: Vec<u64> = order
        .iter()
        .map(|(address, _)| shares.get(address).copied().unwrap_or(0))
        .collect();
    let scaled = rescale(&absolute, MAX_BASIS_POINTS);
    debug!(
        "exporting {} recipients, absolute total {}",
        order.len(),
        absolute.iter().sum::<u64>()
    );

    let recipients = order
        .into_iter()
        .zip(scaled)
        .map(|((address, name), basis_points)| MappedRecipient {
            address,
            name,
            basis_points,
        })
        .collect();

    Ok(SplitMapping {
        recipients,
        tree: tree.root_document(),
    })
}
