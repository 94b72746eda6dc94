pub mod ens;
pub mod provider;
pub mod registry;
pub mod utils;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// One `CheckedIn` log as seen by the dashboard.
///
/// Every field is optional: a log that fails to decode still surfaces as a
/// record with no builder so downstream code can drop it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInEvent {
    pub builder: Option<Address>,
    pub first: Option<bool>,
    pub check_in_contract: Option<Address>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<u64>,
}

#[cfg(test)]
impl CheckInEvent {
    pub fn for_builder(builder: Address) -> Self {
        Self {
            builder: Some(builder),
            ..Default::default()
        }
    }
}
