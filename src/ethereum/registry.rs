use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::{Filter, Log},
    sol,
    sol_types::SolEvent,
};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{
    provider::{call_view, with_timeout, HttpProvider},
    CheckInEvent,
};
use crate::dashboard::source::CheckInSource;

sol! {
    interface BatchRegistry {
        function checkedInCounter() external view returns (uint256 count);

        event CheckedIn(bool first, address builder, address checkInContract);
    }
}

/// Reads the BatchRegistry contract over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RegistryReader {
    provider: HttpProvider,
    address: Address,
    timeout: Duration,
}

impl RegistryReader {
    pub fn new(provider: HttpProvider, address: Address, timeout: Duration) -> Self {
        Self {
            provider,
            address,
            timeout,
        }
    }
}

#[async_trait]
impl CheckInSource for RegistryReader {
    async fn chain_id(&self) -> Result<u64> {
        with_timeout(self.timeout, self.provider.get_chain_id()).await
    }

    async fn checked_in_counter(&self) -> Result<U256> {
        let output = call_view(
            &self.provider,
            self.address,
            &BatchRegistry::checkedInCounterCall {},
            self.timeout,
        )
        .await?;
        Ok(output.count)
    }

    async fn latest_block(&self) -> Result<u64> {
        with_timeout(self.timeout, self.provider.get_block_number()).await
    }

    async fn check_in_events(&self, from_block: u64, to_block: u64) -> Result<Vec<CheckInEvent>> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(BatchRegistry::CheckedIn::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = with_timeout(self.timeout, self.provider.get_logs(&filter)).await?;
        debug!(
            "Fetched {} CheckedIn logs in blocks {}..={}",
            logs.len(),
            from_block,
            to_block
        );

        Ok(logs.iter().map(decode_check_in).collect())
    }
}

/// Decodes a raw log into a check-in record; undecodable payloads keep their
/// position metadata but carry no builder.
pub fn decode_check_in(log: &Log) -> CheckInEvent {
    let mut event = CheckInEvent {
        block_number: log.block_number,
        transaction_hash: log.transaction_hash.map(|h| format!("0x{:x}", h)),
        log_index: log.log_index,
        ..Default::default()
    };

    match BatchRegistry::CheckedIn::decode_log_data(log.data(), true) {
        Ok(decoded) => {
            event.first = Some(decoded.first);
            event.builder = Some(decoded.builder);
            event.check_in_contract = Some(decoded.checkInContract);
        }
        Err(e) => debug!(
            "Skipping undecodable CheckedIn log at block {:?}: {}",
            log.block_number, e
        ),
    }

    event
}
