//! Read-only audit of a split tree
//!
//! Blocking errors: unbalanced branches, out-of-range shares, missing wallet
//! addresses, duplicate real addresses within a branch, branch references
//! that dangle, point upwards or point at a grouping branch. Warnings: empty
//! branches and branches mixing recipients with nested branches.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::basis_points::{format_basis_points, is_balanced, MAX_BASIS_POINTS};
use crate::domain::{
    is_placeholder_address, is_unset_address, normalize_address, AddressType, Branch, SplitTree,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[instrument(level = "debug", skip(tree), fields(tree = %tree.metadata.name))]
pub fn validate(tree: &SplitTree) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // (branch, display path) in pre-order
    let mut stack: Vec<(&Branch, String)> = vec![(tree.root(), tree.root().name.clone())];
    while let Some((branch, path)) = stack.pop() {
        let children = tree.children(&branch.id).unwrap_or_default();
        check_branch(tree, branch, &children, &path, &mut errors, &mut warnings);
        for child in children.into_iter().rev() {
            stack.push((child, format!("{} > {}", path, child.name)));
        }
    }

    debug!("{} errors, {} warnings", errors.len(), warnings.len());
    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_branch(
    tree: &SplitTree,
    branch: &Branch,
    children: &[&Branch],
    path: &str,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let mut seen = HashSet::new();
    let mut duplicate = false;
    for recipient in &branch.recipients {
        if recipient.basis_points > MAX_BASIS_POINTS {
            errors.push(format!(
                "Invalid basis points {} ({}) for recipient {} in {}",
                recipient.basis_points,
                format_basis_points(recipient.basis_points as u64, 2),
                recipient.name,
                path
            ));
        }

        match recipient.address_type {
            AddressType::FixedWallet => {
                if is_unset_address(&recipient.address) || is_placeholder_address(&recipient.address) {
                    errors.push(format!(
                        "Missing address for recipient {} in {}",
                        recipient.name, path
                    ));
                }
            }
            AddressType::PlaceholderBranch | AddressType::RealBranch => match &recipient.branch_ref {
                Some(target) => match tree.branch(target) {
                    Err(_) => errors.push(format!(
                        "Recipient {} in {} references missing branch {}",
                        recipient.name, path, target
                    )),
                    Ok(_) if tree.is_ancestor_or_self(target, &branch.id).unwrap_or(false) => {
                        errors.push(format!(
                            "Recipient {} in {} references its own branch or an ancestor",
                            recipient.name, path
                        ))
                    }
                    Ok(target) if !target.is_resolvable => errors.push(format!(
                        "Recipient {} in {} references grouping branch {}, which has no address",
                        recipient.name, path, target.name
                    )),
                    Ok(_) => {}
                },
                None => errors.push(format!(
                    "Recipient {} in {} is a branch reference without a branch",
                    recipient.name, path
                )),
            },
        }

        let address = normalize_address(&recipient.address);
        let comparable = !is_unset_address(&address) && !is_placeholder_address(&address);
        if comparable && !seen.insert(address) {
            duplicate = true;
        }
    }
    if duplicate {
        errors.push(format!("Duplicate addresses found in {}", path));
    }

    let total: u64 = branch
        .recipients
        .iter()
        .map(|r| r.basis_points as u64)
        .chain(children.iter().map(|c| c.basis_points as u64))
        .sum();
    let has_recipients = !branch.recipients.is_empty();
    let has_children = !children.is_empty();

    if (has_recipients || has_children) && !is_balanced(total) {
        errors.push(format!(
            "Basis points in {} sum to {} bp ({}) instead of {} bp (100%)",
            path,
            total,
            format_basis_points(total, 2),
            MAX_BASIS_POINTS
        ));
    }
    if !has_recipients && !has_children {
        warnings.push(format!("Empty split node: {}", path));
    }
    if has_recipients && has_children {
        warnings.push(format!(
            "Mixed node {} has both recipients and nested splits. Ensure basis points are correctly distributed.",
            path
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BranchId;

    fn balanced_tree() -> (SplitTree, BranchId) {
        let mut tree = SplitTree::new("Main");
        let root = tree.root_id().clone();
        let ids: Vec<_> = tree.root().recipients.iter().map(|r| r.id.clone()).collect();
        for (id, address) in ids.iter().zip(["xch1alice", "xch1bob"]) {
            tree.update_recipient(
                &root,
                id,
                crate::domain::RecipientPatch {
                    address: Some(address.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        (tree, root)
    }

    #[test]
    fn given_default_tree_when_validating_then_missing_addresses_reported() {
        let tree = SplitTree::new("Main");
        let report = validate(&tree);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("Missing address for recipient Recipient 1"));
    }

    #[test]
    fn given_balanced_tree_when_validating_then_valid() {
        let (tree, _) = balanced_tree();
        let report = validate(&tree);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn given_off_by_one_total_when_validating_then_tolerated() {
        let (mut tree, root) = balanced_tree();
        let id = tree.root().recipients[0].id.clone();
        tree.update_recipient(
            &root,
            &id,
            crate::domain::RecipientPatch {
                basis_points: Some(4999),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(validate(&tree).valid);
    }

    #[test]
    fn given_empty_child_when_validating_then_warning_and_mixed_warning() {
        let (mut tree, root) = balanced_tree();
        tree.add_nested_branch(&root, "empty", 0).unwrap();
        let report = validate(&tree);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().any(|w| w == "Empty split node: Main > empty"));
        assert!(report.warnings.iter().any(|w| w.starts_with("Mixed node Main")));
    }
}
