//! Basis-point arithmetic
//!
//! 1 bp = 0.01%, so 100% = 10,000 basis points. All shares are integers;
//! rounding is to the nearest integer with halves rounded up.

use crate::domain::error::{DomainError, DomainResult};

/// Maximum basis points (100%).
pub const MAX_BASIS_POINTS: u32 = 10_000;

/// Allowed drift of a branch total from [`MAX_BASIS_POINTS`].
pub const BALANCE_TOLERANCE: u32 = 1;

/// Bookkeeping fee per resolvable branch (0.25%).
pub const DEFAULT_BRANCH_FEE_BASIS_POINTS: u32 = 25;

/// Cut reserved by the remote address-creation service (1.5%).
pub const DEFAULT_SERVICE_FEE_BASIS_POINTS: u32 = 150;

/// Convert a percentage (0-100) to basis points (0-10000).
pub fn percentage_to_basis_points(percentage: f64) -> u32 {
    (percentage * 100.0).round().max(0.0) as u32
}

/// Convert basis points to a percentage.
pub fn basis_points_to_percentage(basis_points: u64) -> f64 {
    basis_points as f64 / 100.0
}

/// Format basis points as a percentage string, e.g. `12.50%`.
pub fn format_basis_points(basis_points: u64, decimals: usize) -> String {
    format!(
        "{:.*}%",
        decimals,
        basis_points_to_percentage(basis_points)
    )
}

/// True if `total` is within [`BALANCE_TOLERANCE`] of 100%.
pub fn is_balanced(total: u64) -> bool {
    total.abs_diff(MAX_BASIS_POINTS as u64) <= BALANCE_TOLERANCE as u64
}

/// `round(share * basis_points / 10000)`.
pub fn apply_share(share: u64, basis_points: u32) -> u64 {
    (share * basis_points as u64 + MAX_BASIS_POINTS as u64 / 2) / MAX_BASIS_POINTS as u64
}

/// Rescale `values` proportionally so they sum to exactly `target`.
///
/// Each entry is rounded to the nearest integer, then the rounding remainder
/// is moved onto the largest entry (first one on ties). An all-zero input
/// yields all zeros.
pub fn rescale(values: &[u64], target: u32) -> Vec<u32> {
    let total: u64 = values.iter().sum();
    if total == 0 {
        return vec![0; values.len()];
    }
    let target_wide = target as u64;
    let mut scaled: Vec<u32> = values
        .iter()
        .map(|&v| ((v * target_wide + total / 2) / total) as u32)
        .collect();
    reconcile(&mut scaled, values, target);
    scaled
}

/// Scale recipient points for a remote budget that reserves `service_fee` out of
/// 10000, so that `sum(result) + service_fee == 10000` exactly.
pub fn scale_for_service_fee(points: &[u32], service_fee: u32) -> DomainResult<Vec<u32>> {
    if service_fee >= MAX_BASIS_POINTS {
        return Err(DomainError::InvalidBasisPoints(service_fee));
    }
    let budget = MAX_BASIS_POINTS - service_fee;
    let mut scaled: Vec<u32> = points
        .iter()
        .map(|&p| apply_share(p as u64, budget) as u32)
        .collect();
    if points.iter().any(|&p| p > 0) {
        let weights: Vec<u64> = points.iter().map(|&p| p as u64).collect();
        reconcile(&mut scaled, &weights, budget);
    }
    Ok(scaled)
}

/// Move `target - sum(scaled)` onto the entry with the largest weight.
fn reconcile(scaled: &mut [u32], weights: &[u64], target: u32) {
    let Some(largest) = weights
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|(_, &w)| w)
        .map(|(i, _)| i)
    else {
        return;
    };
    let sum: i64 = scaled.iter().map(|&v| v as i64).sum();
    let remainder = target as i64 - sum;
    let adjusted = (scaled[largest] as i64 + remainder).max(0);
    scaled[largest] = adjusted as u32;
}
