use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Validates and normalizes an Ethereum address
pub fn validate_address(address: &str) -> Result<Address> {
    let address = address.trim();

    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(anyhow!(
            "Invalid address format: '{}'. Ethereum addresses must start with '0x'",
            address
        ));
    }

    if address.len() != 42 {
        return Err(anyhow!(
            "Invalid address length: '{}'. Ethereum addresses must be exactly 42 characters (0x + 40 hex characters)",
            address
        ));
    }

    let hex_part = &address[2..];
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "Invalid address format: '{}'. Contains non-hexadecimal characters",
            address
        ));
    }

    Address::from_str(address)
        .map_err(|e| anyhow!("Invalid Ethereum address: '{}'. Error: {}", address, e))
}

/// Validates network name
pub fn validate_network(network: &str, available_networks: &[String]) -> Result<()> {
    if network.is_empty() {
        return Err(anyhow!("Network name cannot be empty"));
    }

    if !available_networks.iter().any(|n| n == network) {
        let mut names = available_networks.to_vec();
        names.sort();
        return Err(anyhow!(
            "Unknown network: '{}'. Available networks: {}",
            network,
            names.join(", ")
        ));
    }

    Ok(())
}

/// Splits `[from, to]` into consecutive inclusive ranges of at most `max_span` blocks.
///
/// Providers cap the span of a single `eth_getLogs` request, so history scans
/// are issued chunk by chunk. An empty vector is returned when `from > to`.
pub fn block_ranges(from: u64, to: u64, max_span: u64) -> Vec<RangeInclusive<u64>> {
    let max_span = max_span.max(1);
    let mut ranges = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start.saturating_add(max_span - 1).min(to);
        ranges.push(start..=end);
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    ranges
}

/// Creates user-friendly error messages for common RPC errors
pub fn interpret_rpc_error(error: &str) -> String {
    if error.contains("execution reverted") {
        "Call failed: the contract reverted. Check that the registry address is deployed on this network.".to_string()
    } else if error.contains("connection refused") || error.contains("network unreachable") {
        "Network error: Cannot connect to RPC endpoint. Check your internet connection and RPC URL configuration.".to_string()
    } else if error.contains("timeout") || error.contains("timed out") {
        "Network error: Request timed out. The RPC endpoint may be overloaded or unreachable."
            .to_string()
    } else if error.contains("rate limit") || error.contains("429") {
        "Rate limit error: Too many requests to the RPC endpoint. Try again in a few moments or use a different endpoint.".to_string()
    } else if error.contains("block range") || error.contains("query returned more than") {
        "RPC error: The log query spans too many blocks. Lower [dashboard].max_block_range.".to_string()
    } else if error.contains("method not found") {
        "RPC error: The requested method is not supported by this RPC endpoint. Try using a different endpoint.".to_string()
    } else {
        format!("RPC error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        // Valid addresses
        assert!(validate_address("0x742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_ok());
        assert!(validate_address("0x0000000000000000000000000000000000000000").is_ok());
        assert!(validate_address("  0x742d35cc6435c9c1c72c5e7b18bab7e1db7a5d6e ").is_ok());

        // Invalid addresses
        assert!(validate_address("").is_err());
        assert!(validate_address("not_an_address").is_err());
        assert!(validate_address("0x123").is_err());
        assert!(validate_address("742d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
        assert!(validate_address("0xgg2d35Cc6435C9c1c72c5E7b18BaB7e1DB7a5d6e").is_err());
    }

    #[test]
    fn test_validate_network() {
        let networks = vec!["optimism".to_string(), "ethereum".to_string()];

        assert!(validate_network("optimism", &networks).is_ok());
        assert!(validate_network("ethereum", &networks).is_ok());
        assert!(validate_network("invalid", &networks).is_err());
        assert!(validate_network("", &networks).is_err());
    }

    #[test]
    fn test_block_ranges_chunking() {
        assert_eq!(block_ranges(10, 34, 10), vec![10..=19, 20..=29, 30..=34]);
        assert_eq!(block_ranges(5, 5, 1000), vec![5..=5]);
        assert!(block_ranges(6, 5, 1000).is_empty());
        assert_eq!(block_ranges(0, 2, 0), vec![0..=0, 1..=1, 2..=2]);
    }

    #[test]
    fn test_block_ranges_end_of_range() {
        let ranges = block_ranges(u64::MAX - 1, u64::MAX, 10);
        assert_eq!(ranges, vec![u64::MAX - 1..=u64::MAX]);
    }

    #[test]
    fn test_interpret_rpc_error() {
        assert!(interpret_rpc_error("request timed out").starts_with("Network error"));
        assert!(interpret_rpc_error("HTTP error 429").starts_with("Rate limit"));
        assert_eq!(interpret_rpc_error("boom"), "RPC error: boom");
    }
}
