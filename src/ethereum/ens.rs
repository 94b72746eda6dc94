use alloy::{
    primitives::{keccak256, Address, B256},
    sol,
};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::provider::{call_view, HttpProvider};
use crate::dashboard::source::NameResolver;

sol! {
    interface EnsRegistry {
        function resolver(bytes32 node) external view returns (address resolverAddress);
    }

    interface EnsNameResolver {
        function name(bytes32 node) external view returns (string memory resolvedName);
        function addr(bytes32 node) external view returns (address resolvedAddress);
    }
}

/// EIP-137 namehash of a dot separated name.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }

    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        node = keccak256(buf);
    }

    node
}

/// The reverse record name of an address, `<lowercase hex>.addr.reverse`.
pub fn reverse_name(address: Address) -> String {
    format!("{}.addr.reverse", hex::encode(address.as_slice()))
}

/// Resolves primary ENS names through the registry's reverse records.
#[derive(Debug, Clone)]
pub struct EnsResolver {
    provider: HttpProvider,
    registry: Address,
    timeout: Duration,
}

impl EnsResolver {
    pub fn new(provider: HttpProvider, registry: Address, timeout: Duration) -> Self {
        Self {
            provider,
            registry,
            timeout,
        }
    }

    async fn resolver_for(&self, node: B256) -> Result<Option<Address>> {
        let output = call_view(
            &self.provider,
            self.registry,
            &EnsRegistry::resolverCall { node },
            self.timeout,
        )
        .await?;

        if output.resolverAddress == Address::ZERO {
            Ok(None)
        } else {
            Ok(Some(output.resolverAddress))
        }
    }
}

#[async_trait]
impl NameResolver for EnsResolver {
    async fn lookup(&self, address: Address) -> Result<Option<String>> {
        let reverse_node = namehash(&reverse_name(address));
        let Some(reverse_resolver) = self.resolver_for(reverse_node).await? else {
            return Ok(None);
        };

        let name = call_view(
            &self.provider,
            reverse_resolver,
            &EnsNameResolver::nameCall { node: reverse_node },
            self.timeout,
        )
        .await?
        .resolvedName;

        if name.is_empty() {
            return Ok(None);
        }

        // A reverse record is only trusted when the name resolves back to the address.
        let forward_node = namehash(&name);
        let Some(forward_resolver) = self.resolver_for(forward_node).await? else {
            debug!("ENS name {} for {} has no resolver", name, address);
            return Ok(None);
        };

        let resolved = call_view(
            &self.provider,
            forward_resolver,
            &EnsNameResolver::addrCall { node: forward_node },
            self.timeout,
        )
        .await?
        .resolvedAddress;

        if resolved == address {
            Ok(Some(name))
        } else {
            debug!(
                "ENS name {} for {} resolves to {} instead, ignoring",
                name, address, resolved
            );
            Ok(None)
        }
    }
}
