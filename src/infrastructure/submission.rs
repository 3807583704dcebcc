//! Request payload for the remote address-creation service
//!
//! The service keeps its own fee out of a 10000-point budget, so recipient
//! points are scaled down until `sum(points) + fee == 10000`.

use serde::{Deserialize, Serialize};

use crate::domain::basis_points::scale_for_service_fee;
use crate::domain::DomainResult;
use crate::infrastructure::traits::Allocation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRecipient {
    pub name: String,
    pub address: String,
    /// Scaled basis points
    pub points: u32,
    /// 1-based position in the request
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSubmission {
    pub recipients: Vec<SubmittedRecipient>,
}

impl SplitSubmission {
    /// Build the payload for `allocations`; `names` are optional display names
    /// matched by position, missing ones become `Recipient N`.
    pub fn new(
        allocations: &[Allocation],
        names: &[Option<String>],
        service_fee_basis_points: u32,
    ) -> DomainResult<Self> {
        let points: Vec<u32> = allocations.iter().map(|a| a.basis_points).collect();
        let scaled = scale_for_service_fee(&points, service_fee_basis_points)?;
        let recipients = allocations
            .iter()
            .zip(scaled)
            .enumerate()
            .map(|(i, (allocation, points))| SubmittedRecipient {
                name: names
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| format!("Recipient {}", i + 1)),
                address: allocation.address.clone(),
                points,
                id: i as u32 + 1,
            })
            .collect();
        Ok(Self { recipients })
    }

    pub fn total_points(&self) -> u32 {
        self.recipients.iter().map(|r| r.points).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_allocations_when_building_submission_then_fee_fills_budget() {
        let allocations = vec![
            Allocation::new("xch1aaa", 6000),
            Allocation::new("xch1bbb", 3000),
            Allocation::new("xch1ccc", 1000),
        ];
        let names = vec![Some("Alice".to_string()), None];
        let submission = SplitSubmission::new(&allocations, &names, 150).unwrap();

        assert_eq!(submission.total_points() + 150, 10_000);
        assert_eq!(submission.recipients[0].name, "Alice");
        assert_eq!(submission.recipients[1].name, "Recipient 2");
        assert_eq!(submission.recipients[2].name, "Recipient 3");
        assert_eq!(submission.recipients[2].id, 3);
        assert_eq!(submission.recipients[0].points, 5910);
    }
}
