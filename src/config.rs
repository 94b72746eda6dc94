use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

use crate::dashboard::view::Layout;
use crate::ethereum::utils;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub networks: HashMap<String, NetworkConfig>,
    pub default_network: String,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub ens: EnsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Address of the deployed BatchRegistry contract
    pub address: String,
    /// First block scanned for CheckedIn events
    pub from_block: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub required_chain_id: u64,
    pub required_network_name: String,
    pub poll_interval_secs: u64,
    pub watch: bool,
    pub max_block_range: u64,
    pub request_timeout_secs: u64,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsConfig {
    pub enabled: bool,
    /// Name of the entry in `networks` used for ENS lookups
    pub network: String,
    pub registry: String,
}

pub const DEFAULT_FROM_BLOCK: u64 = 116_978_463;
pub const OPTIMISM_CHAIN_ID: u64 = 10;
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            from_block: DEFAULT_FROM_BLOCK,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Batch 3".to_string(),
            required_chain_id: OPTIMISM_CHAIN_ID,
            required_network_name: "Optimism".to_string(),
            poll_interval_secs: 4,
            watch: true,
            max_block_range: 10_000,
            request_timeout_secs: 30,
            layout: Layout::Wide,
        }
    }
}

impl Default for EnsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            network: "ethereum".to_string(),
            registry: ENS_REGISTRY_ADDRESS.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut networks = HashMap::new();

        networks.insert(
            "optimism".to_string(),
            NetworkConfig {
                rpc_url: "https://opt-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: OPTIMISM_CHAIN_ID,
                explorer_url: Some("https://optimistic.etherscan.io".to_string()),
            },
        );

        networks.insert(
            "ethereum".to_string(),
            NetworkConfig {
                rpc_url: "https://eth-mainnet.g.alchemy.com/v2/demo".to_string(),
                chain_id: 1,
                explorer_url: Some("https://etherscan.io".to_string()),
            },
        );

        Self {
            networks,
            default_network: "optimism".to_string(),
            registry: RegistryConfig::default(),
            dashboard: DashboardConfig::default(),
            ens: EnsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks
            .get(name)
            .ok_or_else(|| anyhow!("Network '{}' not configured", name))
    }

    /// Checks that the configuration can drive a dashboard before any RPC is made
    pub fn validate(&self) -> Result<()> {
        let available: Vec<String> = self.networks.keys().cloned().collect();
        utils::validate_network(&self.default_network, &available)
            .map_err(|e| anyhow!("Invalid default_network: {}", e))?;

        if self.registry.address.trim().is_empty() {
            return Err(anyhow!(
                "No BatchRegistry address configured. Set [registry].address in the config file, set BATCH_REGISTRY_ADDRESS or pass --registry"
            ));
        }
        utils::validate_address(&self.registry.address)
            .map_err(|e| anyhow!("Invalid [registry].address: {}", e))?;

        if self.ens.enabled {
            utils::validate_network(&self.ens.network, &available)
                .map_err(|e| anyhow!("Invalid [ens].network: {}", e))?;
            utils::validate_address(&self.ens.registry)
                .map_err(|e| anyhow!("Invalid [ens].registry: {}", e))?;
        }

        if self.dashboard.poll_interval_secs == 0 {
            return Err(anyhow!("[dashboard].poll_interval_secs must be greater than zero"));
        }
        if self.dashboard.max_block_range == 0 {
            return Err(anyhow!("[dashboard].max_block_range must be greater than zero"));
        }
        if self.dashboard.request_timeout_secs == 0 {
            return Err(anyhow!("[dashboard].request_timeout_secs must be greater than zero"));
        }

        Ok(())
    }

    /// Apply environment variable substitutions to configuration
    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("ALCHEMY_API_KEY") {
            tracing::info!("Using ALCHEMY_API_KEY environment variable for RPC URLs");
            self.substitute_api_key(&api_key);
        } else {
            for (network_name, network_config) in &self.networks {
                if network_config.rpc_url.contains("/demo") {
                    tracing::warn!("Using demo RPC endpoint for {}, set ALCHEMY_API_KEY environment variable for better reliability", network_name);
                }
            }
        }

        if let Ok(address) = std::env::var("BATCH_REGISTRY_ADDRESS") {
            tracing::debug!("Using BATCH_REGISTRY_ADDRESS environment variable");
            self.registry.address = address;
        }
    }

    fn substitute_api_key(&mut self, api_key: &str) {
        for (network_name, network_config) in &mut self.networks {
            if network_config.rpc_url.contains("alchemy.com/v2/demo") {
                network_config.rpc_url = network_config
                    .rpc_url
                    .replace("/demo", &format!("/{}", api_key));
                tracing::debug!("Updated {} RPC URL with API key", network_name);
            } else if network_config.rpc_url.contains("YOUR_API_KEY_HERE") {
                network_config.rpc_url = network_config
                    .rpc_url
                    .replace("YOUR_API_KEY_HERE", api_key);
                tracing::debug!("Updated {} RPC URL with API key", network_name);
            }
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("checkin-dashboard").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Check-in dashboard configuration

# Network the registry lives on
default_network = "optimism"

[networks.optimism]
rpc_url = "https://opt-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 10
explorer_url = "https://optimistic.etherscan.io"

[networks.ethereum]
rpc_url = "https://eth-mainnet.g.alchemy.com/v2/YOUR_API_KEY_HERE"
chain_id = 1
explorer_url = "https://etherscan.io"

[registry]
address = "0x0000000000000000000000000000000000000000"  # BatchRegistry deployment
from_block = 116978463

[dashboard]
title = "Batch 3"
required_chain_id = 10
required_network_name = "Optimism"
poll_interval_secs = 4
watch = true
max_block_range = 10000   # eth_getLogs range per request
request_timeout_secs = 30
layout = "wide"           # wide | narrow | auto

# Display names are resolved through ENS reverse records
[ens]
enabled = true
network = "ethereum"
registry = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e"

# Environment variables that can be used:
# ALCHEMY_API_KEY - Your Alchemy API key (replaces YOUR_API_KEY_HERE above)
# BATCH_REGISTRY_ADDRESS - Overrides [registry].address
# RUST_LOG - Log filter, logs go to stderr
"#;
        sample_config.to_string()
    }
}
