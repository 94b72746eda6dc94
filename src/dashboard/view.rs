use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;
use tabled::{settings::Style, Table, Tabled};

use super::{source::Fetch, Dashboard};

pub const LOADING: &str = "...";
pub const RESOLVING: &str = "Resolving...";

/// Terminals narrower than this get abbreviated addresses in `auto` layout.
const WIDE_MIN_COLUMNS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Full addresses
    Wide,
    /// `0x123...cdef` addresses
    Narrow,
    /// Picks wide or narrow from the terminal width
    Auto,
}

impl Layout {
    /// Resolves `Auto` against the terminal width, when known.
    pub fn resolve(self, columns: Option<usize>) -> Layout {
        match self {
            Layout::Auto => match columns {
                Some(columns) if columns < WIDE_MIN_COLUMNS => Layout::Narrow,
                _ => Layout::Wide,
            },
            layout => layout,
        }
    }
}

impl FromStr for Layout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wide" => Ok(Layout::Wide),
            "narrow" => Ok(Layout::Narrow),
            "auto" => Ok(Layout::Auto),
            other => Err(anyhow!(
                "Unknown layout '{}'. Expected one of: wide, narrow, auto",
                other
            )),
        }
    }
}

/// Shortens an address to its first five and last four characters.
pub fn format_address(address: &str) -> String {
    if address.is_empty() {
        return RESOLVING.to_string();
    }

    let chars: Vec<char> = address.chars().collect();
    let head: String = chars.iter().take(5).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}

#[derive(Debug, Clone, Tabled)]
struct BuilderTableRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "ENS")]
    name: String,
}

fn display_name(dashboard: &Dashboard, builder: &Address) -> String {
    let short = format_address(&builder.to_string());
    if !dashboard.resolve_names() {
        return short;
    }

    match dashboard.name(builder) {
        Some(Fetch::Ready(Some(name))) => name.clone(),
        Some(Fetch::Ready(None)) | Some(Fetch::Failed(_)) => short,
        Some(Fetch::Loading) | None => RESOLVING.to_string(),
    }
}

fn counter_cell(dashboard: &Dashboard) -> String {
    match dashboard.counter() {
        Fetch::Loading => LOADING.to_string(),
        Fetch::Ready(count) => count.to_string(),
        Fetch::Failed(e) => format!("unavailable ({})", e),
    }
}

/// Renders the dashboard as plain text.
pub fn render(dashboard: &Dashboard, layout: Layout) -> Result<String, fmt::Error> {
    let mut out = String::new();

    writeln!(out, "Welcome to")?;
    writeln!(out, "{}", dashboard.title())?;
    writeln!(out)?;
    writeln!(out, "Checked in builders count: {}", counter_cell(dashboard))?;
    writeln!(out)?;

    if let Some(e) = dashboard.network_error() {
        writeln!(out, "Could not read the connected network: {}", e)?;
    }

    if !dashboard.gate().is_open() {
        match dashboard.gate().active_chain_id() {
            None if dashboard.network_error().is_none() => {
                writeln!(out, "Connecting to network {}", LOADING)?;
            }
            None => writeln!(
                out,
                "Please connect to {} to read the list of builders",
                dashboard.network_name()
            )?,
            Some(chain_id) => writeln!(
                out,
                "Please connect to {} to read the list of builders (connected chain id: {})",
                dashboard.network_name(),
                chain_id
            )?,
        }
        return Ok(out);
    }

    writeln!(out, "List of Builders")?;

    match dashboard.events() {
        Fetch::Loading => writeln!(out, "{}", LOADING)?,
        Fetch::Failed(e) => writeln!(out, "Failed to load check-in events: {}", e)?,
        Fetch::Ready(_) if dashboard.builders().is_empty() => {
            writeln!(out, "No builders have checked in yet")?;
        }
        Fetch::Ready(_) => {
            let rows: Vec<BuilderTableRow> = dashboard
                .builders()
                .as_slice()
                .iter()
                .map(|builder| {
                    let full = builder.to_string();
                    BuilderTableRow {
                        address: match layout {
                            Layout::Narrow => format_address(&full),
                            _ => full,
                        },
                        name: display_name(dashboard, builder),
                    }
                })
                .collect();

            writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
        }
    }

    if let Some(e) = dashboard.watch_error() {
        writeln!(out, "Watching for new check-ins failed: {}", e)?;
    }

    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct BuilderRow {
    pub address: String,
    pub short_address: String,
    pub name: Option<String>,
}

/// Machine readable view of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub title: String,
    pub required_chain_id: u64,
    pub chain_id: Option<u64>,
    pub on_required_network: bool,
    pub checked_in_counter: Fetch<String>,
    pub events: Fetch<usize>,
    pub builders: Vec<BuilderRow>,
}

impl Snapshot {
    pub fn capture(dashboard: &Dashboard) -> Self {
        let checked_in_counter = match dashboard.counter() {
            Fetch::Loading => Fetch::Loading,
            Fetch::Ready(count) => Fetch::Ready(count.to_string()),
            Fetch::Failed(e) => Fetch::Failed(e.clone()),
        };

        let events = match dashboard.events() {
            Fetch::Loading => Fetch::Loading,
            Fetch::Ready(history) => Fetch::Ready(history.len()),
            Fetch::Failed(e) => Fetch::Failed(e.clone()),
        };

        // The builder list is gated like the table.
        let builders = if dashboard.gate().is_open() {
            dashboard
                .builders()
                .as_slice()
                .iter()
                .map(|builder| {
                    let address = builder.to_string();
                    BuilderRow {
                        short_address: format_address(&address),
                        name: dashboard
                            .name(builder)
                            .and_then(|name| name.ready().cloned().flatten()),
                        address,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            title: dashboard.title().to_string(),
            required_chain_id: dashboard.gate().required_chain_id(),
            chain_id: dashboard.gate().active_chain_id(),
            on_required_network: dashboard.gate().is_open(),
            checked_in_counter,
            events,
            builders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::dashboard::Update;
    use crate::ethereum::CheckInEvent;
    use alloy::primitives::{address, U256};

    const VITALIK: Address = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    const OTHER: Address = address!("1234567890123456789012345678901234567890");

    fn dashboard() -> Dashboard {
        Dashboard::new(&DashboardConfig::default(), true)
    }

    fn connected_with_builders() -> Dashboard {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));
        dashboard.apply(Update::Counter(Fetch::Ready(U256::from(2))));
        dashboard.apply(Update::Events(vec![
            CheckInEvent::for_builder(VITALIK),
            CheckInEvent::for_builder(OTHER),
        ]));
        dashboard
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address("0x1234567890abcdef"), "0x123...cdef");
        assert_eq!(format_address(""), "Resolving...");
        assert_eq!(
            format_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
            "0xd8d...6045"
        );
        assert_eq!(format_address("0xab"), "0xab...0xab");
    }

    #[test]
    fn test_layout_parsing_and_resolution() {
        assert_eq!("Narrow".parse::<Layout>().unwrap(), Layout::Narrow);
        assert!("tiny".parse::<Layout>().is_err());

        assert_eq!(Layout::Auto.resolve(Some(80)), Layout::Narrow);
        assert_eq!(Layout::Auto.resolve(Some(160)), Layout::Wide);
        assert_eq!(Layout::Auto.resolve(None), Layout::Wide);
        assert_eq!(Layout::Narrow.resolve(Some(200)), Layout::Narrow);
    }

    #[test]
    fn test_counter_placeholder_while_loading() {
        let mut dashboard = dashboard();
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Checked in builders count: ...\n"));

        dashboard.apply(Update::Counter(Fetch::Ready(U256::from(42))));
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Checked in builders count: 42\n"));

        dashboard.apply(Update::Counter(Fetch::Loading));
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Checked in builders count: ...\n"));
        assert!(!out.contains("42"));
    }

    #[test]
    fn test_wrong_network_hides_table() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(VITALIK)]));
        dashboard.apply(Update::NetworkChanged(1));

        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains(
            "Please connect to Optimism to read the list of builders (connected chain id: 1)"
        ));
        assert!(!out.contains("List of Builders"));
        assert!(!out.contains("0xd8dA"));
    }

    #[test]
    fn test_events_loading_placeholder() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));

        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("List of Builders\n...\n"));
    }

    #[test]
    fn test_events_failure_is_distinct_from_loading() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));
        dashboard.apply(Update::EventsFailed("RPC error: boom".to_string()));

        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Failed to load check-in events: RPC error: boom"));
    }

    #[test]
    fn test_table_layouts() {
        let mut dashboard = connected_with_builders();
        dashboard.apply(Update::Name(VITALIK, Fetch::Ready(Some("vitalik.eth".to_string()))));
        dashboard.apply(Update::Name(OTHER, Fetch::Ready(None)));

        let wide = render(&dashboard, Layout::Wide).unwrap();
        assert!(wide.contains("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(wide.contains("vitalik.eth"));
        assert!(wide.contains("Address"));
        assert!(wide.contains("ENS"));

        let narrow = render(&dashboard, Layout::Narrow).unwrap();
        assert!(!narrow.contains("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(narrow.contains("0xd8d...6045"));
        // no ENS name falls back to the short address
        assert!(narrow.contains("0x123...7890"));

        let first = wide.find("0xd8dA6BF2").unwrap();
        let second = wide.find("0x1234567890123456").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_pending_names_show_resolving() {
        let dashboard = connected_with_builders();
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains(RESOLVING));
    }

    #[test]
    fn test_snapshot() {
        let mut dashboard = connected_with_builders();
        dashboard.apply(Update::Name(VITALIK, Fetch::Ready(Some("vitalik.eth".to_string()))));

        let snapshot = Snapshot::capture(&dashboard);
        assert!(snapshot.on_required_network);
        assert_eq!(snapshot.chain_id, Some(10));
        assert_eq!(snapshot.checked_in_counter, Fetch::Ready("2".to_string()));
        assert_eq!(snapshot.events, Fetch::Ready(2));
        assert_eq!(snapshot.builders.len(), 2);
        assert_eq!(snapshot.builders[0].name.as_deref(), Some("vitalik.eth"));
        assert_eq!(snapshot.builders[1].name, None);
        assert_eq!(snapshot.builders[1].short_address, "0x123...7890");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["checked_in_counter"]["value"], "2");
    }

    #[test]
    fn test_snapshot_hides_builders_off_network() {
        let mut dashboard = connected_with_builders();
        dashboard.apply(Update::NetworkChanged(1));

        let snapshot = Snapshot::capture(&dashboard);
        assert!(!snapshot.on_required_network);
        assert_eq!(snapshot.chain_id, Some(1));
        assert_eq!(snapshot.required_chain_id, 10);
        assert!(snapshot.builders.is_empty());
        // the counter is not gated
        assert_eq!(snapshot.checked_in_counter, Fetch::Ready("2".to_string()));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["builders"], serde_json::json!([]));
    }

    #[test]
    fn test_unknown_network_shows_placeholder() {
        let mut dashboard = dashboard();
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Connecting to network ...\n"));
        assert!(!out.contains("Please connect"));

        dashboard.apply(Update::NetworkFailed("RPC error: down".to_string()));
        let out = render(&dashboard, Layout::Wide).unwrap();
        assert!(out.contains("Could not read the connected network: RPC error: down"));
        assert!(out.contains("Please connect to Optimism to read the list of builders\n"));
    }
}
