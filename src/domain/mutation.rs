//! Structural edits on a split tree
//!
//! Every lookup fails with a not-found error when the id is unknown. Edits do
//! not re-check basis-point totals; that is the validator's job.
//!
//! An edit that changes what a branch pays out makes its real address stale.
//! The branch goes back to a placeholder, together with every resolvable
//! branch that pays it (its parent and branches referencing it), and the tree
//! is no longer finalized.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::domain::arena::SplitTree;
use crate::domain::basis_points::MAX_BASIS_POINTS;
use crate::domain::entities::{
    is_placeholder_address, AddressType, Branch, BranchId, Recipient, RecipientId, SplitAddress,
};
use crate::domain::error::{DomainError, DomainResult};

/// Field-level patch for a recipient. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPatch {
    pub name: Option<String>,
    /// Only allowed for fixed-wallet recipients
    pub address: Option<String>,
    pub basis_points: Option<u32>,
}

/// Field-level patch for a branch. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchPatch {
    pub name: Option<String>,
    pub basis_points: Option<u32>,
    pub is_resolvable: Option<bool>,
    pub fee_basis_points: Option<u32>,
    pub net_basis_points: Option<u32>,
}

fn check_range(basis_points: u32) -> DomainResult<()> {
    if basis_points > MAX_BASIS_POINTS {
        return Err(DomainError::InvalidBasisPoints(basis_points));
    }
    Ok(())
}

impl SplitTree {
    #[instrument(level = "debug", skip(self, name, address))]
    pub fn add_fixed_wallet_recipient(
        &mut self,
        branch_id: &BranchId,
        name: impl Into<String>,
        address: impl Into<String>,
        basis_points: u32,
    ) -> DomainResult<RecipientId> {
        check_range(basis_points)?;
        let recipient = Recipient::fixed_wallet(name, address, basis_points);
        let id = recipient.id.clone();
        self.branch_mut(branch_id)?.recipients.push(recipient);
        self.invalidate(branch_id);
        self.touch();
        Ok(id)
    }

    /// Add a recipient standing in for `target_id`.
    ///
    /// The target must be a resolvable branch and must not be `branch_id`
    /// itself or one of its ancestors: such a branch could only get its
    /// address after `branch_id` has one.
    #[instrument(level = "debug", skip(self, name))]
    pub fn add_branch_recipient(
        &mut self,
        branch_id: &BranchId,
        name: impl Into<String>,
        target_id: &BranchId,
        basis_points: u32,
    ) -> DomainResult<RecipientId> {
        check_range(basis_points)?;
        self.branch(branch_id)?;
        let target = self.branch(target_id)?;
        if !target.is_resolvable {
            return Err(DomainError::NotResolvable(target_id.clone()));
        }
        if self.is_ancestor_or_self(target_id, branch_id)? {
            return Err(DomainError::CycleDetected {
                from: branch_id.clone(),
                to: target_id.clone(),
            });
        }
        let recipient = Recipient::branch_reference(name, target, basis_points);
        let id = recipient.id.clone();
        self.branch_mut(branch_id)?.recipients.push(recipient);
        self.invalidate(branch_id);
        self.touch();
        Ok(id)
    }

    /// Add an empty resolvable branch with a placeholder address under `parent_id`.
    #[instrument(level = "debug", skip(self, name))]
    pub fn add_nested_branch(
        &mut self,
        parent_id: &BranchId,
        name: impl Into<String>,
        basis_points: u32,
    ) -> DomainResult<BranchId> {
        check_range(basis_points)?;
        let branch = Branch::new(name, basis_points);
        let id = branch.id.clone();
        self.insert_branch(parent_id, branch)?;
        self.invalidate(parent_id);
        self.touch();
        Ok(id)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn remove_recipient(
        &mut self,
        branch_id: &BranchId,
        recipient_id: &RecipientId,
    ) -> DomainResult<Recipient> {
        let branch = self.branch_mut(branch_id)?;
        let pos = branch
            .recipients
            .iter()
            .position(|r| &r.id == recipient_id)
            .ok_or_else(|| DomainError::RecipientNotFound {
                branch: branch_id.clone(),
                recipient: recipient_id.clone(),
            })?;
        let removed = branch.recipients.remove(pos);
        self.invalidate(branch_id);
        self.touch();
        Ok(removed)
    }

    /// Remove the direct child `child_id` of `parent_id` with its whole subtree.
    ///
    /// Recipients anywhere in the remaining tree that referenced a removed
    /// branch are deleted too; their ids are returned.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_branch(
        &mut self,
        parent_id: &BranchId,
        child_id: &BranchId,
    ) -> DomainResult<Vec<RecipientId>> {
        if child_id == self.root_id() {
            return Err(DomainError::RootRemoval);
        }
        self.branch(parent_id)?;
        self.branch(child_id)?;
        if self.parent_id(child_id)? != Some(parent_id) {
            return Err(DomainError::NotAChild {
                parent: parent_id.clone(),
                child: child_id.clone(),
            });
        }

        let removed: HashSet<BranchId> = self.detach_subtree(child_id)?.into_iter().collect();
        let mut dropped = Vec::new();
        let mut holders = Vec::new();
        for branch in self.branches_mut() {
            let before = branch.recipients.len();
            branch.recipients.retain(|r| {
                let dangling = r
                    .branch_ref
                    .as_ref()
                    .is_some_and(|target| removed.contains(target));
                if dangling {
                    dropped.push(r.id.clone());
                }
                !dangling
            });
            if branch.recipients.len() != before {
                holders.push(branch.id.clone());
            }
        }
        debug!(
            "removed {} branches, dropped {} referencing recipients",
            removed.len(),
            dropped.len()
        );
        self.invalidate(parent_id);
        for holder in &holders {
            self.invalidate(holder);
        }
        self.touch();
        Ok(dropped)
    }

    #[instrument(level = "debug", skip(self, patch))]
    pub fn update_recipient(
        &mut self,
        branch_id: &BranchId,
        recipient_id: &RecipientId,
        patch: RecipientPatch,
    ) -> DomainResult<()> {
        if let Some(bp) = patch.basis_points {
            check_range(bp)?;
        }
        let recipient = self
            .branch_mut(branch_id)?
            .recipients
            .iter_mut()
            .find(|r| &r.id == recipient_id)
            .ok_or_else(|| DomainError::RecipientNotFound {
                branch: branch_id.clone(),
                recipient: recipient_id.clone(),
            })?;

        if patch.address.is_some() && recipient.address_type.is_branch() {
            return Err(DomainError::InvalidRecipient {
                recipient: recipient_id.clone(),
                message: "address of a branch reference is derived from its branch".into(),
            });
        }
        let payout_changed = patch.address.as_ref().is_some_and(|a| *a != recipient.address)
            || patch.basis_points.is_some_and(|bp| bp != recipient.basis_points);
        if let Some(name) = patch.name {
            recipient.name = name;
        }
        if let Some(address) = patch.address {
            recipient.address = address;
        }
        if let Some(bp) = patch.basis_points {
            recipient.basis_points = bp;
        }
        if payout_changed {
            self.invalidate(branch_id);
        }
        self.touch();
        Ok(())
    }

    #[instrument(level = "debug", skip(self, patch))]
    pub fn update_branch(&mut self, branch_id: &BranchId, patch: BranchPatch) -> DomainResult<()> {
        if let Some(bp) = patch.basis_points {
            check_range(bp)?;
        }
        if patch.is_resolvable == Some(false) && self.is_referenced(branch_id) {
            return Err(DomainError::NotResolvable(branch_id.clone()));
        }
        let parent_id = self.parent_id(branch_id)?.cloned();
        let branch = self.branch_mut(branch_id)?;
        let share_changed = patch.basis_points.is_some_and(|bp| bp != branch.basis_points);
        let resolvable_changed = patch.is_resolvable.is_some_and(|r| r != branch.is_resolvable);
        if let Some(name) = patch.name {
            branch.name = name;
        }
        if let Some(bp) = patch.basis_points {
            branch.basis_points = bp;
        }
        if let Some(resolvable) = patch.is_resolvable {
            branch.is_resolvable = resolvable;
        }
        if resolvable_changed {
            // an address created before the toggle no longer reflects the branch
            self.reset_address(branch_id);
        }
        if share_changed || resolvable_changed {
            match &parent_id {
                Some(parent_id) => self.invalidate(parent_id),
                None => self.metadata.is_finalized = false,
            }
        }
        let branch = self.branch_mut(branch_id)?;
        if let Some(fee) = patch.fee_basis_points {
            branch.fee_basis_points = Some(fee);
        }
        if let Some(net) = patch.net_basis_points {
            branch.net_basis_points = Some(net);
        }
        self.touch();
        Ok(())
    }

    pub fn rename_branch(&mut self, branch_id: &BranchId, name: impl Into<String>) -> DomainResult<()> {
        self.update_branch(
            branch_id,
            BranchPatch {
                name: Some(name.into()),
                ..Default::default()
            },
        )
    }

    /// Set fee bookkeeping on every resolvable branch: `net = basis_points - fee`.
    pub fn annotate_fees(&mut self, fee_basis_points: u32) {
        for branch in self.branches_mut().filter(|b| b.is_resolvable) {
            branch.fee_basis_points = Some(fee_basis_points);
            branch.net_basis_points = Some(branch.basis_points.saturating_sub(fee_basis_points));
        }
        self.touch();
    }

    /// Store the real address created for `branch_id` and flip every recipient
    /// referencing it to [`AddressType::RealBranch`].
    #[instrument(level = "debug", skip(self))]
    pub fn assign_real_address(&mut self, branch_id: &BranchId, address: &str) -> DomainResult<()> {
        self.branch_mut(branch_id)?.address = SplitAddress::Real(address.to_string());
        for branch in self.branches_mut() {
            for recipient in branch
                .recipients
                .iter_mut()
                .filter(|r| r.branch_ref.as_ref() == Some(branch_id))
            {
                recipient.address = address.to_string();
                recipient.address_type = AddressType::RealBranch;
            }
        }
        self.touch();
        Ok(())
    }

    /// Send `branch_id` and every resolvable branch paying it, transitively,
    /// back to placeholders, and clear the finalized flag.
    fn invalidate(&mut self, branch_id: &BranchId) {
        self.metadata.is_finalized = false;
        let mut stale: HashSet<BranchId> = HashSet::new();
        let mut pending = vec![branch_id.clone()];
        while let Some(id) = pending.pop() {
            if !stale.insert(id.clone()) {
                continue;
            }
            // a grouping branch has no address, so nothing pays it
            if !self.branch(&id).is_ok_and(|b| b.is_resolvable) {
                continue;
            }
            if let Ok(Some(parent)) = self.parent_id(&id) {
                pending.push(parent.clone());
            }
            pending.extend(self.holders_of_reference(&id));
        }
        for id in &stale {
            if self.branch(id).is_ok_and(|b| b.is_resolvable && b.address.is_real()) {
                self.reset_address(id);
            }
        }
        debug!("{} branches invalidated", stale.len());
    }

    /// Give `branch_id` a fresh placeholder and point its references at it.
    fn reset_address(&mut self, branch_id: &BranchId) {
        let placeholder = SplitAddress::placeholder();
        let address = placeholder.as_str().to_string();
        if let Ok(branch) = self.branch_mut(branch_id) {
            branch.address = placeholder;
        }
        for branch in self.branches_mut() {
            for recipient in branch
                .recipients
                .iter_mut()
                .filter(|r| r.branch_ref.as_ref() == Some(branch_id))
            {
                recipient.address = address.clone();
                recipient.address_type = AddressType::PlaceholderBranch;
            }
        }
    }

    /// Branches holding a recipient that references `target`.
    fn holders_of_reference(&self, target: &BranchId) -> Vec<BranchId> {
        self.iter()
            .filter(|b| b.recipients.iter().any(|r| r.branch_ref.as_ref() == Some(target)))
            .map(|b| b.id.clone())
            .collect()
    }

    /// True if any recipient references `branch_id`.
    pub fn is_referenced(&self, branch_id: &BranchId) -> bool {
        self.iter()
            .flat_map(|b| b.recipients.iter())
            .any(|r| r.branch_ref.as_ref() == Some(branch_id))
    }

    /// True if any resolvable branch or branch reference is still a placeholder.
    pub fn has_placeholders(&self) -> bool {
        self.iter().any(|branch| {
            (branch.is_resolvable && !branch.address.is_real())
                || branch.recipients.iter().any(|r| {
                    r.address_type == AddressType::PlaceholderBranch
                        || is_placeholder_address(&r.address)
                })
        })
    }
}
