//! Persisted tree document
//!
//! Nested, JSON-serializable shape of a [`SplitTree`]. Field names are
//! camelCase; legacy names from earlier exports (`splitAddress`,
//! `isSplitXCH`, `splitNodeId`) are accepted on input.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::arena::SplitTree;
use crate::domain::basis_points::MAX_BASIS_POINTS;
use crate::domain::entities::{Branch, BranchId, Recipient, SplitAddress, TreeMetadata};
use crate::domain::error::{DomainError, DomainResult};

fn default_true() -> bool {
    true
}

fn default_root_share() -> u32 {
    MAX_BASIS_POINTS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDocument {
    pub id: BranchId,
    pub name: String,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub children: Vec<BranchDocument>,
    #[serde(default)]
    pub parent_id: Option<BranchId>,
    #[serde(default = "default_root_share")]
    pub basis_points: u32,
    #[serde(alias = "splitAddress", default = "SplitAddress::placeholder")]
    pub address: SplitAddress,
    #[serde(alias = "isSplitXCH", default = "default_true")]
    pub is_resolvable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_basis_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_basis_points: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataDocument {
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_finalized: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDocument {
    pub root: BranchDocument,
    #[serde(default)]
    pub metadata: MetadataDocument,
}

impl BranchDocument {
    fn from_branch(branch: &Branch, parent_id: Option<BranchId>) -> Self {
        Self {
            id: branch.id.clone(),
            name: branch.name.clone(),
            recipients: branch.recipients.clone(),
            children: Vec::new(),
            parent_id,
            basis_points: branch.basis_points,
            address: branch.address.clone(),
            is_resolvable: branch.is_resolvable,
            fee_basis_points: branch.fee_basis_points,
            net_basis_points: branch.net_basis_points,
        }
    }

    fn to_branch(&self) -> Branch {
        Branch {
            id: self.id.clone(),
            name: self.name.clone(),
            basis_points: self.basis_points,
            address: self.address.clone(),
            is_resolvable: self.is_resolvable,
            fee_basis_points: self.fee_basis_points,
            net_basis_points: self.net_basis_points,
            recipients: self.recipients.clone(),
        }
    }
}

impl SplitTree {
    /// Nested copy of the branch structure below (and including) the root.
    pub fn root_document(&self) -> BranchDocument {
        // Children are complete before their parent in post-order, so each
        // finished document can be moved into its parent's slot.
        let mut finished: HashMap<BranchId, BranchDocument> = HashMap::new();
        for branch in self.iter_postorder() {
            let parent_id = self.parent_id(&branch.id).ok().flatten().cloned();
            let mut doc = BranchDocument::from_branch(branch, parent_id);
            let child_ids: Vec<BranchId> = self
                .children(&branch.id)
                .map(|cs| cs.into_iter().map(|c| c.id.clone()).collect())
                .unwrap_or_default();
            for child_id in child_ids {
                if let Some(child_doc) = finished.remove(&child_id) {
                    doc.children.push(child_doc);
                }
            }
            finished.insert(branch.id.clone(), doc);
        }
        finished
            .remove(self.root_id())
            .unwrap_or_else(|| BranchDocument::from_branch(self.root(), None))
    }

    pub fn to_document(&self) -> TreeDocument {
        TreeDocument {
            root: self.root_document(),
            metadata: MetadataDocument {
                name: Some(self.metadata.name.clone()),
                description: self.metadata.description.clone(),
                created_at: Some(self.metadata.created_at),
                updated_at: Some(self.metadata.updated_at),
                is_finalized: Some(self.metadata.is_finalized),
            },
        }
    }
}

impl TreeDocument {
    /// Rebuild the arena, checking structure only: ids unique, parent links
    /// consistent, every `branchRef` pointing at a branch that is neither the
    /// holder nor one of its ancestors. Basis-point invariants are left to
    /// the validator.
    pub fn into_tree(self) -> DomainResult<SplitTree> {
        let now = Utc::now();
        let metadata = TreeMetadata {
            name: self
                .metadata
                .name
                .unwrap_or_else(|| self.root.name.clone()),
            description: self.metadata.description,
            created_at: self.metadata.created_at.unwrap_or(now),
            updated_at: self.metadata.updated_at.unwrap_or(now),
            is_finalized: self.metadata.is_finalized.unwrap_or(false),
        };

        if self.root.parent_id.is_some() {
            return Err(DomainError::ParentMismatch {
                branch: self.root.id.clone(),
                declared: self.root.parent_id.clone(),
                actual: None,
            });
        }

        let mut tree = SplitTree::with_root(self.root.to_branch(), metadata);
        let mut seen_recipients = HashSet::new();
        let mut stack: Vec<(&BranchDocument, BranchId)> = Vec::new();
        for child in self.root.children.iter().rev() {
            stack.push((child, self.root.id.clone()));
        }
        check_recipient_ids(&self.root, &mut seen_recipients)?;

        while let Some((doc, parent)) = stack.pop() {
            if let Some(declared) = &doc.parent_id {
                if *declared != parent {
                    return Err(DomainError::ParentMismatch {
                        branch: doc.id.clone(),
                        declared: Some(declared.clone()),
                        actual: Some(parent),
                    });
                }
            }
            check_recipient_ids(doc, &mut seen_recipients)?;
            tree.insert_branch(&parent, doc.to_branch())?;
            for child in doc.children.iter().rev() {
                stack.push((child, doc.id.clone()));
            }
        }
        check_references(&tree)?;
        // a stored flag cannot outlive the addresses it stands for
        tree.metadata.is_finalized &= !tree.has_placeholders();
        Ok(tree)
    }
}

fn check_references(tree: &SplitTree) -> DomainResult<()> {
    for branch in tree.iter() {
        for recipient in &branch.recipients {
            let Some(target) = &recipient.branch_ref else {
                continue;
            };
            if !tree.contains(target) {
                return Err(DomainError::DanglingReference {
                    recipient: recipient.id.clone(),
                    target: target.clone(),
                });
            }
            if tree.is_ancestor_or_self(target, &branch.id)? {
                return Err(DomainError::CycleDetected {
                    from: branch.id.clone(),
                    to: target.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_recipient_ids<'a>(
    doc: &'a BranchDocument,
    seen: &mut HashSet<&'a str>,
) -> DomainResult<()> {
    for recipient in &doc.recipients {
        if !seen.insert(recipient.id.as_str()) {
            return Err(DomainError::InvalidRecipient {
                recipient: recipient.id.clone(),
                message: "duplicate recipient id".into(),
            });
        }
    }
    Ok(())
}
