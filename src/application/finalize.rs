//! Bottom-up finalization
//!
//! Every resolvable branch is turned into a real address by the external
//! [`AddressCreator`], dependencies before dependents. A branch is submitted only
//! when each branch it depends on (its resolvable children and every branch
//! its recipients reference) already has a real address. Failures are
//! recorded per branch and never stop unrelated branches from being
//! attempted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::application::validator::validate;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::basis_points::is_balanced;
use crate::domain::{is_placeholder_address, Branch, BranchId, SplitTree};
use crate::infrastructure::error::CreationError;
use crate::infrastructure::traits::{AddressCreator, Allocation};

/// Why a branch was left with its placeholder address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    #[error("depends on {} which has no real address", .0.join(", "))]
    DependencyUnavailable(Vec<String>),

    #[error("references unknown branch {0}")]
    UnknownReference(BranchId),

    #[error("has no recipients")]
    NoRecipients,

    #[error("basis points sum to {0} instead of 10000")]
    Unbalanced(u64),

    #[error("could not be created: {0}")]
    Creation(#[from] CreationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    pub branch_id: BranchId,
    pub branch_name: String,
    pub cause: FailureCause,
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Split \"{}\" {}", self.branch_name, self.cause)
    }
}

/// Outcome of one finalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizationReport {
    /// True only if every resolvable branch has a real address
    pub success: bool,
    /// Addresses created during this pass
    pub created_addresses: BTreeMap<BranchId, String>,
    /// One entry per branch left unresolved
    pub errors: Vec<BranchFailure>,
    /// The pass was stopped by the shutdown signal
    pub cancelled: bool,
}

impl FinalizationReport {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    fn fail(&mut self, branch: &Branch, cause: FailureCause) {
        warn!(branch = %branch.id, "split \"{}\" {}", branch.name, cause);
        self.errors.push(BranchFailure {
            branch_id: branch.id.clone(),
            branch_name: branch.name.clone(),
            cause,
        });
    }
}

/// Real addresses of all resolvable branches that already have one.
pub fn known_addresses(tree: &SplitTree) -> HashMap<BranchId, String> {
    tree.iter()
        .filter(|b| b.is_resolvable)
        .filter_map(|b| b.address.real().map(|a| (b.id.clone(), a.to_string())))
        .collect()
}

/// Flat allocation list for `branch`, substituting the real addresses in `known`.
///
/// Direct wallet recipients are copied as-is, branch references and
/// resolvable children are replaced by their real address.
pub fn allocations_for(
    tree: &SplitTree,
    branch: &Branch,
    known: &HashMap<BranchId, String>,
) -> Result<Vec<Allocation>, FailureCause> {
    let mut allocations = Vec::new();
    let mut missing = Vec::new();

    for recipient in &branch.recipients {
        if !recipient.address_type.is_branch() {
            allocations.push(Allocation::new(recipient.address.clone(), recipient.basis_points));
            continue;
        }
        match &recipient.branch_ref {
            Some(target) => match known.get(target) {
                Some(address) => allocations.push(Allocation::new(address.clone(), recipient.basis_points)),
                None if !tree.contains(target) => {
                    return Err(FailureCause::UnknownReference(target.clone()))
                }
                None => missing.push(format!("recipient \"{}\"", recipient.name)),
            },
            None => missing.push(format!("recipient \"{}\"", recipient.name)),
        }
    }

    for child in tree
        .children(&branch.id)
        .unwrap_or_default()
        .into_iter()
        .filter(|c| c.is_resolvable)
    {
        match known.get(&child.id) {
            Some(address) => allocations.push(Allocation::new(address.clone(), child.basis_points)),
            None => missing.push(format!("branch \"{}\"", child.name)),
        }
    }

    if !missing.is_empty() {
        return Err(FailureCause::DependencyUnavailable(missing));
    }
    if allocations.is_empty() {
        return Err(FailureCause::NoRecipients);
    }
    let total: u64 = allocations.iter().map(|a| a.basis_points as u64).sum();
    if !is_balanced(total) {
        return Err(FailureCause::Unbalanced(total));
    }
    Ok(allocations)
}

/// Branches in submission order: post-order, except that a branch referencing
/// a branch later in post-order waits for it. Branches stuck in a reference
/// cycle are appended in post-order and fail with a missing dependency.
pub fn finalization_order(tree: &SplitTree) -> Vec<BranchId> {
    let postorder: Vec<&Branch> = tree.iter_postorder().collect();
    let position: HashMap<&BranchId, usize> = postorder
        .iter()
        .enumerate()
        .map(|(i, b)| (&b.id, i))
        .collect();

    let mut waiting_on = vec![0usize; postorder.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); postorder.len()];
    for (i, branch) in postorder.iter().enumerate() {
        let children = tree.children(&branch.id).unwrap_or_default();
        let deps: BTreeSet<usize> = children
            .iter()
            .filter(|c| c.is_resolvable)
            .map(|c| &c.id)
            .chain(branch.recipients.iter().filter_map(|r| r.branch_ref.as_ref()))
            .filter_map(|id| position.get(id).copied())
            .filter(|&d| d != i)
            .collect();
        waiting_on[i] = deps.len();
        for d in deps {
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..postorder.len()).filter(|&i| waiting_on[i] == 0).collect();
    let mut done = vec![false; postorder.len()];
    let mut order = Vec::with_capacity(postorder.len());
    while let Some(i) = ready.pop_first() {
        done[i] = true;
        order.push(postorder[i].id.clone());
        for &j in &dependents[i] {
            waiting_on[j] -= 1;
            if waiting_on[j] == 0 {
                ready.insert(j);
            }
        }
    }
    if order.len() < postorder.len() {
        warn!("{} branches in a reference cycle", postorder.len() - order.len());
        order.extend(
            postorder
                .iter()
                .enumerate()
                .filter(|(i, _)| !done[*i])
                .map(|(_, b)| b.id.clone()),
        );
    }
    order
}

/// Resolves once `shutdown` carries `true`; never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Drives the finalization pass against an [`AddressCreator`].
pub struct Finalizer {
    creator: Arc<dyn AddressCreator>,
    timeout: Option<Duration>,
}

impl Finalizer {
    pub fn new(creator: Arc<dyn AddressCreator>) -> Self {
        Self {
            creator,
            timeout: None,
        }
    }

    /// Bound every creation call; an expired call counts as a failed branch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Finalize without an external stop signal.
    pub async fn finalize(&self, tree: &mut SplitTree) -> ApplicationResult<FinalizationReport> {
        let (_keep_open, shutdown) = watch::channel(false);
        self.finalize_until(tree, shutdown).await
    }

    /// Finalize `tree`, stopping before the next branch once `shutdown` is `true`.
    ///
    /// Branches that already carry a real address are reused, not resubmitted,
    /// so rerunning after a partial failure only attempts what is left. A tree
    /// failing validation is refused with [`ApplicationError::InvalidTree`].
    #[instrument(level = "info", skip_all, fields(tree = %tree.metadata.name))]
    pub async fn finalize_until(
        &self,
        tree: &mut SplitTree,
        mut shutdown: watch::Receiver<bool>,
    ) -> ApplicationResult<FinalizationReport> {
        let validation = validate(tree);
        if !validation.valid {
            return Err(ApplicationError::InvalidTree {
                errors: validation.errors,
            });
        }

        let order = finalization_order(tree);
        let mut known = known_addresses(tree);
        let mut report = FinalizationReport::default();
        debug!("{} branches, {} already real", order.len(), known.len());

        for id in order {
            if *shutdown.borrow() {
                info!("finalization cancelled");
                report.cancelled = true;
                break;
            }

            let branch = tree.branch(&id)?;
            if !branch.is_resolvable || known.contains_key(&id) {
                continue;
            }
            let allocations = match allocations_for(tree, branch, &known) {
                Ok(allocations) => allocations,
                Err(cause) => {
                    report.fail(branch, cause);
                    continue;
                }
            };

            let span = info_span!("create_address", branch = %branch.name);
            let outcome = tokio::select! {
                biased;
                created = self.create(&allocations).instrument(span) => Some(created),
                _ = shutdown_requested(&mut shutdown) => None,
            };

            match outcome {
                Some(Ok(address)) => {
                    info!(branch = %id, "created {}", address);
                    tree.assign_real_address(&id, &address)?;
                    known.insert(id.clone(), address.clone());
                    report.created_addresses.insert(id, address);
                }
                Some(Err(e)) => {
                    let branch = tree.branch(&id)?;
                    report.fail(branch, FailureCause::Creation(e));
                }
                None => {
                    info!("finalization cancelled during creation");
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.success = report.errors.is_empty() && !report.cancelled;
        tree.metadata.is_finalized = report.success;
        tree.touch();
        info!(
            "finalization done: {} created, {} failed",
            report.created_addresses.len(),
            report.errors.len()
        );
        Ok(report)
    }

    async fn create(&self, allocations: &[Allocation]) -> Result<String, CreationError> {
        let call = self.creator.create_address(allocations);
        let address = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CreationError::Timeout {
                    seconds: limit.as_secs(),
                })??,
            None => call.await?,
        };
        let address = address.trim().to_string();
        if address.is_empty() {
            return Err(CreationError::NoAddress);
        }
        if is_placeholder_address(&address) {
            return Err(CreationError::InvalidAddress(address));
        }
        Ok(address)
    }
}
