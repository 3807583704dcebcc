//! Domain entities: core data structures

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of locally generated placeholder addresses.
pub const PLACEHOLDER_PREFIX: &str = "splitxch_temp_";

/// Sentinel shown for a wallet address the user has not entered yet.
pub const ADDRESS_SENTINEL: &str = "xch1...";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh unique id.
            pub fn generate() -> Self {
                Self(format!("id_{}", Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a branch.
    BranchId
);
string_id!(
    /// Stable identifier of a recipient.
    RecipientId
);

/// Kind of payout address a recipient carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    /// User-supplied wallet address
    FixedWallet,
    /// Stands in for a branch whose address has not been created yet
    #[serde(alias = "SPLITXCH_PLACEHOLDER")]
    PlaceholderBranch,
    /// Stands in for a branch that has a real address
    #[serde(alias = "SPLITXCH_REAL")]
    RealBranch,
}

impl AddressType {
    pub fn is_branch(self) -> bool {
        matches!(self, AddressType::PlaceholderBranch | AddressType::RealBranch)
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AddressType::FixedWallet => "wallet",
            AddressType::PlaceholderBranch => "branch (placeholder)",
            AddressType::RealBranch => "branch",
        };
        f.write_str(label)
    }
}

/// Leaf of the split tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: RecipientId,
    pub name: String,
    pub address: String,
    pub address_type: AddressType,
    /// Share of the owning branch (0-10000)
    pub basis_points: u32,
    /// Branch this recipient stands in for; authoritative over `address`
    #[serde(default, alias = "splitNodeId", skip_serializing_if = "Option::is_none")]
    pub branch_ref: Option<BranchId>,
}

impl Recipient {
    pub fn fixed_wallet(name: impl Into<String>, address: impl Into<String>, basis_points: u32) -> Self {
        Self {
            id: RecipientId::generate(),
            name: name.into(),
            address: address.into(),
            address_type: AddressType::FixedWallet,
            basis_points,
            branch_ref: None,
        }
    }

    /// Recipient standing in for `target`, copying its current address.
    pub fn branch_reference(name: impl Into<String>, target: &Branch, basis_points: u32) -> Self {
        let address_type = if target.address.is_real() {
            AddressType::RealBranch
        } else {
            AddressType::PlaceholderBranch
        };
        Self {
            id: RecipientId::generate(),
            name: name.into(),
            address: target.address.as_str().to_string(),
            address_type,
            basis_points,
            branch_ref: Some(target.id.clone()),
        }
    }

    /// Address used for comparisons and accumulation.
    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }
}

/// Address of a resolvable branch.
///
/// Serialized as a plain string; placeholder addresses are recognized by
/// [`PLACEHOLDER_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SplitAddress {
    Placeholder(String),
    Real(String),
}

impl SplitAddress {
    /// Fresh locally generated placeholder.
    pub fn placeholder() -> Self {
        SplitAddress::Placeholder(format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SplitAddress::Placeholder(s) | SplitAddress::Real(s) => s,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, SplitAddress::Real(_))
    }

    pub fn real(&self) -> Option<&str> {
        match self {
            SplitAddress::Real(s) => Some(s),
            SplitAddress::Placeholder(_) => None,
        }
    }
}

impl From<String> for SplitAddress {
    fn from(value: String) -> Self {
        if value.trim().is_empty() || is_placeholder_address(&value) {
            SplitAddress::Placeholder(value)
        } else {
            SplitAddress::Real(value)
        }
    }
}

impl From<SplitAddress> for String {
    fn from(value: SplitAddress) -> Self {
        match value {
            SplitAddress::Placeholder(s) | SplitAddress::Real(s) => s,
        }
    }
}

impl fmt::Display for SplitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal or root node of the split tree.
///
/// Structure (parent and children) is owned by the
/// [`SplitTree`](crate::domain::arena::SplitTree) arena; a `Branch` only
/// carries its own payload and its direct recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    /// Share of the parent branch (10000 for the root)
    pub basis_points: u32,
    pub address: SplitAddress,
    /// Whether the external service turns this branch into an address
    pub is_resolvable: bool,
    pub fee_basis_points: Option<u32>,
    pub net_basis_points: Option<u32>,
    pub recipients: Vec<Recipient>,
}

impl Branch {
    /// Empty resolvable branch with a placeholder address.
    pub fn new(name: impl Into<String>, basis_points: u32) -> Self {
        Self {
            id: BranchId::generate(),
            name: name.into(),
            basis_points,
            address: SplitAddress::placeholder(),
            is_resolvable: true,
            fee_basis_points: None,
            net_basis_points: None,
            recipients: Vec::new(),
        }
    }

    pub fn recipient(&self, id: &RecipientId) -> Option<&Recipient> {
        self.recipients.iter().find(|r| &r.id == id)
    }
}

/// Descriptive data of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMetadata {
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// True only once every resolvable branch has a real address
    pub is_finalized: bool,
}

impl TreeMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
            is_finalized: false,
        }
    }
}

/// Lower-cased, trimmed form of an address.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// True for locally generated placeholder addresses.
pub fn is_placeholder_address(address: &str) -> bool {
    normalize_address(address).starts_with(PLACEHOLDER_PREFIX)
}

/// True for an empty address or the "not entered yet" sentinel.
pub fn is_unset_address(address: &str) -> bool {
    let trimmed = address.trim();
    trimmed.is_empty() || trimmed == ADDRESS_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_placeholder_string_when_converting_then_placeholder_variant() {
        let placeholder = SplitAddress::placeholder();
        let round_trip = SplitAddress::from(String::from(placeholder.clone()));
        assert_eq!(round_trip, placeholder);
        assert!(!round_trip.is_real());
    }

    #[test]
    fn given_real_string_when_converting_then_real_variant() {
        let address = SplitAddress::from("xch1realaddress".to_string());
        assert_eq!(address.real(), Some("xch1realaddress"));
    }

    #[test]
    fn given_sentinel_when_checking_then_unset() {
        assert!(is_unset_address(" xch1... "));
        assert!(is_unset_address(""));
        assert!(!is_unset_address("xch1abc"));
    }

    #[test]
    fn test_address_type_wire_names() {
        let json = serde_json::to_string(&AddressType::PlaceholderBranch).unwrap();
        assert_eq!(json, "\"PLACEHOLDER_BRANCH\"");
        let legacy: AddressType = serde_json::from_str("\"SPLITXCH_REAL\"").unwrap();
        assert_eq!(legacy, AddressType::RealBranch);
    }
}
