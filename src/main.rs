mod config;
mod dashboard;
mod ethereum;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use config::Config;
use dashboard::{
    runner::{Runner, RunnerOptions},
    source::NameResolver,
    view::{self, Snapshot},
    Dashboard,
};
use ethereum::{ens::EnsResolver, provider::ProviderManager, registry::RegistryReader, utils};
use std::io::{IsTerminal, Write};
use std::time::Duration;
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("checkin-dashboard")
        .version("0.1.0")
        .about("Terminal dashboard of builders checked in to a BatchRegistry contract")
        .after_help(
            "The registry address has no default. Pass --registry, set BATCH_REGISTRY_ADDRESS, \
             or write it to the [registry] section of the config file (see --generate-config).",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .help("Network the registry is read from (optimism, ethereum, ...)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .help("RPC endpoint URL for the selected network"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("ADDRESS")
                .help(
                    "BatchRegistry contract address, required unless set in the config file or BATCH_REGISTRY_ADDRESS",
                ),
        )
        .arg(
            Arg::new("from-block")
                .long("from-block")
                .value_name("BLOCK")
                .value_parser(clap::value_parser!(u64))
                .help("First block scanned for CheckedIn events"),
        )
        .arg(
            Arg::new("layout")
                .long("layout")
                .value_name("LAYOUT")
                .value_parser(["wide", "narrow", "auto"])
                .help("Table layout: full addresses (wide) or abbreviated (narrow)"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Refresh once, print the dashboard and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print a JSON snapshot instead of the table (implies --once)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-watch")
                .long("no-watch")
                .help("Read event history once instead of following new blocks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-ens")
                .long("no-ens")
                .help("Do not resolve ENS names")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .help("Write the effective configuration to the config file path and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the dashboard
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    if let Some(network) = matches.get_one::<String>("network") {
        config.default_network = network.clone();
    }

    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        if let Some(network_config) = config.networks.get_mut(&config.default_network) {
            network_config.rpc_url = rpc_url.clone();
        }
    }

    if let Some(registry) = matches.get_one::<String>("registry") {
        config.registry.address = registry.clone();
    }

    if let Some(from_block) = matches.get_one::<u64>("from-block") {
        config.registry.from_block = *from_block;
    }

    if let Some(layout) = matches.get_one::<String>("layout") {
        config.dashboard.layout = layout.parse()?;
    }

    if matches.get_flag("no-watch") {
        config.dashboard.watch = false;
    }

    if matches.get_flag("no-ens") {
        config.ens.enabled = false;
    }

    if matches.get_flag("init-config") {
        let path: std::path::PathBuf = match config_path {
            Some(path) => path.into(),
            None => Config::default_config_path()?,
        };
        config.save_to_file(&path).await?;
        println!("{}", path.display());
        return Ok(());
    }

    config.validate()?;

    info!("Starting check-in dashboard");
    let chain_id = config.network(&config.default_network)?.chain_id;
    info!("Network: {} (chain id {})", config.default_network, chain_id);
    if chain_id != config.dashboard.required_chain_id {
        warn!(
            "Configured chain id {} differs from the required chain id {}, the builder list will stay hidden",
            chain_id, config.dashboard.required_chain_id
        );
    }
    info!(
        "Registry: {} from block {}",
        config.registry.address, config.registry.from_block
    );

    let provider_manager = ProviderManager::new(config.clone())?;
    if let Err(e) = provider_manager.validate_network_connection(None).await {
        warn!("{}", e);
    }

    let timeout = provider_manager.request_timeout();
    let registry_address = utils::validate_address(&config.registry.address)?;
    let source = RegistryReader::new(
        provider_manager.get_provider(None)?.clone(),
        registry_address,
        timeout,
    );

    let names: Option<Box<dyn NameResolver>> = if config.ens.enabled {
        let ens_provider = provider_manager
            .get_provider(Some(&config.ens.network))
            .map_err(|e| anyhow!("ENS network unavailable: {}", e))?;
        let ens_registry = utils::validate_address(&config.ens.registry)?;
        info!("Resolving ENS names on {}", config.ens.network);
        Some(Box::new(EnsResolver::new(
            ens_provider.clone(),
            ens_registry,
            timeout,
        )))
    } else {
        None
    };

    let dashboard = Dashboard::new(&config.dashboard, names.is_some());
    let options = RunnerOptions {
        from_block: config.registry.from_block,
        watch: config.dashboard.watch,
        max_block_range: config.dashboard.max_block_range,
        poll_interval: Duration::from_secs(config.dashboard.poll_interval_secs),
    };
    let mut runner = Runner::new(Box::new(source), names, options, dashboard);

    let columns = std::env::var("COLUMNS")
        .ok()
        .and_then(|columns| columns.parse().ok());
    let layout = config.dashboard.layout.resolve(columns);

    let stdout = std::io::stdout();
    if matches.get_flag("json") {
        runner.refresh().await;
        let snapshot = Snapshot::capture(runner.dashboard());
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if matches.get_flag("once") {
        runner.refresh().await;
        let mut out = stdout.lock();
        write!(out, "{}", view::render(runner.dashboard(), layout)?)?;
        out.flush()?;
        return Ok(());
    }

    let clear_screen = stdout.is_terminal();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let mut out = stdout.lock();
    if let Err(e) = runner
        .run_until(layout, clear_screen, &mut out, shutdown)
        .await
    {
        error!("Dashboard error: {}", e);
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_cli_parses_overrides() {
        let matches = cli()
            .try_get_matches_from([
                "checkin-dashboard",
                "--from-block",
                "120000000",
                "--layout",
                "narrow",
                "--no-ens",
            ])
            .unwrap();

        assert_eq!(matches.get_one::<u64>("from-block"), Some(&120_000_000));
        assert_eq!(
            matches.get_one::<String>("layout").map(String::as_str),
            Some("narrow")
        );
        assert!(matches.get_flag("no-ens"));
        assert!(!matches.get_flag("once"));
    }

    #[test]
    fn test_cli_rejects_unknown_layout() {
        assert!(cli()
            .try_get_matches_from(["checkin-dashboard", "--layout", "tiny"])
            .is_err());
    }

    #[test]
    fn test_help_names_registry_sources() {
        let help = cli().render_long_help().to_string();
        assert!(help.contains("--registry"));
        assert!(help.contains("BATCH_REGISTRY_ADDRESS"));
        assert!(help.contains("[registry]"));
    }
}
