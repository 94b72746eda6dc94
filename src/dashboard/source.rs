use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::ethereum::CheckInEvent;

/// State of one asynchronously fetched value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Fetch<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Default for Fetch<T> {
    fn default() -> Self {
        Fetch::Loading
    }
}

impl<T> Fetch<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Fetch::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetch::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Fetch::Ready(value),
            Err(e) => Fetch::Failed(e.to_string()),
        }
    }
}

/// Chain reads the dashboard depends on.
#[async_trait]
pub trait CheckInSource: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64>;

    /// Total number of check-ins recorded by the registry
    async fn checked_in_counter(&self) -> Result<U256>;

    async fn latest_block(&self) -> Result<u64>;

    /// `CheckedIn` events emitted in the inclusive block range
    async fn check_in_events(&self, from_block: u64, to_block: u64) -> Result<Vec<CheckInEvent>>;
}

/// Maps an address to a human readable display name, e.g. an ENS primary name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn lookup(&self, address: Address) -> Result<Option<String>>;
}
