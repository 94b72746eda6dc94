use crate::config::{Config, NetworkConfig};
use crate::ethereum::utils;
use alloy::{
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
    transports::http::{Client, Http},
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::time::Duration;

pub type HttpProvider = RootProvider<Http<Client>>;

#[derive(Debug)]
pub struct ProviderManager {
    providers: HashMap<String, HttpProvider>,
    config: Config,
}

impl ProviderManager {
    pub fn new(config: Config) -> Result<Self> {
        let mut providers = HashMap::new();

        for (network_name, network_config) in &config.networks {
            let provider = Self::create_provider(network_config)
                .map_err(|e| anyhow!("Invalid RPC URL for network '{}': {}", network_name, e))?;
            providers.insert(network_name.clone(), provider);
        }

        Ok(Self { providers, config })
    }

    fn create_provider(network_config: &NetworkConfig) -> Result<HttpProvider> {
        let provider = ProviderBuilder::new().on_http(network_config.rpc_url.parse()?);

        Ok(provider)
    }

    pub fn get_provider(&self, network: Option<&str>) -> Result<&HttpProvider> {
        let network_name = network.unwrap_or(&self.config.default_network);
        self.providers
            .get(network_name)
            .ok_or_else(|| anyhow!("Network '{}' not found", network_name))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.dashboard.request_timeout_secs)
    }

    /// Validates network connectivity with detailed error information
    pub async fn validate_network_connection(&self, network: Option<&str>) -> Result<()> {
        let network_name = network.unwrap_or(&self.config.default_network);
        let provider = self
            .get_provider(network)
            .map_err(|e| anyhow!("Network '{}' is not configured: {}", network_name, e))?;

        match with_timeout(self.request_timeout(), provider.get_block_number()).await {
            Ok(_) => Ok(()),
            Err(e) => Err(anyhow!(
                "Cannot connect to network '{}': {}. Please check your RPC endpoint configuration and network connectivity.",
                network_name,
                e
            )),
        }
    }
}

/// Awaits an RPC future, failing once `timeout` elapses.
///
/// Transport errors are mapped through `interpret_rpc_error` so every caller
/// reports them the same way.
pub async fn with_timeout<T, E, F>(timeout: Duration, request: F) -> Result<T>
where
    F: IntoFuture<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(anyhow!(utils::interpret_rpc_error(&e.to_string()))),
        Err(_) => Err(anyhow!(
            "Network error: Request timed out after {:?}. The RPC endpoint may be overloaded or unreachable.",
            timeout
        )),
    }
}

/// Performs an `eth_call` of a typed view function and decodes its return value.
pub async fn call_view<C: SolCall>(
    provider: &HttpProvider,
    to: Address,
    call: &C,
    timeout: Duration,
) -> Result<C::Return> {
    let request = TransactionRequest::default()
        .to(to)
        .input(Bytes::from(call.abi_encode()).into());

    let output = with_timeout(timeout, provider.call(&request)).await?;

    if output.is_empty() {
        return Err(anyhow!(
            "Call to {}() at {} returned no data. Is the contract deployed on this network?",
            C::SIGNATURE.split('(').next().unwrap_or(C::SIGNATURE),
            to
        ));
    }

    C::abi_decode_returns(&output, true)
        .map_err(|e| anyhow!("Failed to decode {} output: {}", C::SIGNATURE, e))
}
