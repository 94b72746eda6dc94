pub mod builders;
pub mod gate;
pub mod runner;
pub mod source;
pub mod view;

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::ethereum::CheckInEvent;
use builders::{accumulate, BuilderList};
use gate::NetworkGate;
use source::Fetch;

/// A state change delivered by one of the data sources.
#[derive(Debug, Clone)]
pub enum Update {
    NetworkChanged(u64),
    NetworkFailed(String),
    Counter(Fetch<U256>),
    /// Newly observed `CheckedIn` events, appended to the known history
    Events(Vec<CheckInEvent>),
    EventsFailed(String),
    Name(Address, Fetch<Option<String>>),
}

/// Everything the check-in view is derived from.
///
/// State only changes through [`Dashboard::apply`]; after each update the
/// builder list is reconciled against the current inputs.
#[derive(Debug, Clone)]
pub struct Dashboard {
    title: String,
    network_name: String,
    gate: NetworkGate,
    network_error: Option<String>,
    counter: Fetch<U256>,
    events: Fetch<Vec<CheckInEvent>>,
    watch_error: Option<String>,
    builders: BuilderList,
    names: HashMap<Address, Fetch<Option<String>>>,
    resolve_names: bool,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig, resolve_names: bool) -> Self {
        Self {
            title: config.title.clone(),
            network_name: config.required_network_name.clone(),
            gate: NetworkGate::new(config.required_chain_id),
            network_error: None,
            counter: Fetch::Loading,
            events: Fetch::Loading,
            watch_error: None,
            builders: BuilderList::new(),
            names: HashMap::new(),
            resolve_names,
        }
    }

    pub fn apply(&mut self, update: Update) {
        match update {
            Update::NetworkChanged(chain_id) => {
                self.network_error = None;
                if self.gate.observe(chain_id) {
                    if self.gate.is_open() {
                        info!("Connected to {} (chain id {})", self.network_name, chain_id);
                    } else {
                        warn!(
                            "Chain id {} is not {} (chain id {}), builder list paused",
                            chain_id,
                            self.network_name,
                            self.gate.required_chain_id()
                        );
                    }
                }
            }
            Update::NetworkFailed(message) => self.network_error = Some(message),
            Update::Counter(counter) => self.counter = counter,
            Update::Events(batch) => {
                self.watch_error = None;
                match &mut self.events {
                    Fetch::Ready(history) => history.extend(batch),
                    _ => self.events = Fetch::Ready(batch),
                }
            }
            Update::EventsFailed(message) => {
                if self.events.ready().is_some() {
                    self.watch_error = Some(message);
                } else {
                    self.events = Fetch::Failed(message);
                }
            }
            Update::Name(address, name) => {
                self.names.insert(address, name);
            }
        }

        self.reconcile();
    }

    /// Re-runs the accumulator over the current inputs. A no-op when nothing changed.
    fn reconcile(&mut self) {
        let appended = accumulate(
            &mut self.builders,
            self.events.ready().map(Vec::as_slice),
            self.gate.is_open(),
            self.events.is_loading(),
        );

        if appended > 0 {
            info!(
                "{} new builder(s) checked in, {} listed",
                appended,
                self.builders.len()
            );
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn gate(&self) -> &NetworkGate {
        &self.gate
    }

    pub fn network_error(&self) -> Option<&str> {
        self.network_error.as_deref()
    }

    pub fn counter(&self) -> &Fetch<U256> {
        &self.counter
    }

    pub fn events(&self) -> &Fetch<Vec<CheckInEvent>> {
        &self.events
    }

    pub fn watch_error(&self) -> Option<&str> {
        self.watch_error.as_deref()
    }

    pub fn builders(&self) -> &BuilderList {
        &self.builders
    }

    pub fn name(&self, address: &Address) -> Option<&Fetch<Option<String>>> {
        self.names.get(address)
    }

    pub fn resolve_names(&self) -> bool {
        self.resolve_names
    }

    /// Builders whose display name is neither resolved nor known to be absent.
    pub fn unresolved_builders(&self) -> Vec<Address> {
        if !self.resolve_names {
            return Vec::new();
        }

        self.builders
            .as_slice()
            .iter()
            .filter(|builder| !matches!(self.names.get(*builder), Some(Fetch::Ready(_))))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ALICE: Address = address!("000000000000000000000000000000000000000a");
    const BOB: Address = address!("000000000000000000000000000000000000000b");

    fn dashboard() -> Dashboard {
        Dashboard::new(&DashboardConfig::default(), true)
    }

    #[test]
    fn test_events_ignored_while_gate_closed() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(1));
        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(ALICE)]));

        assert!(dashboard.builders().is_empty());
        assert!(dashboard.events().ready().is_some());
    }

    #[test]
    fn test_opening_gate_merges_known_history() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(ALICE)]));
        assert!(dashboard.builders().is_empty());

        dashboard.apply(Update::NetworkChanged(10));
        assert_eq!(dashboard.builders().as_slice(), &[ALICE]);
    }

    #[test]
    fn test_events_append_to_history() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));
        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(ALICE)]));
        dashboard.apply(Update::Events(vec![
            CheckInEvent::for_builder(ALICE),
            CheckInEvent::for_builder(BOB),
        ]));

        assert_eq!(dashboard.builders().as_slice(), &[ALICE, BOB]);
        assert_eq!(dashboard.events().ready().map(Vec::len), Some(3));
    }

    #[test]
    fn test_closing_gate_keeps_builders() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));
        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(ALICE)]));
        dashboard.apply(Update::NetworkChanged(1));

        assert!(!dashboard.gate().is_open());
        assert_eq!(dashboard.builders().as_slice(), &[ALICE]);

        dashboard.apply(Update::Events(vec![CheckInEvent::for_builder(BOB)]));
        assert_eq!(dashboard.builders().as_slice(), &[ALICE]);
    }

    #[test]
    fn test_event_failures_before_and_after_history() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::EventsFailed("RPC error: boom".to_string()));
        assert_eq!(
            dashboard.events(),
            &Fetch::Failed("RPC error: boom".to_string())
        );

        dashboard.apply(Update::Events(Vec::new()));
        dashboard.apply(Update::EventsFailed("RPC error: again".to_string()));
        assert!(dashboard.events().ready().is_some());
        assert_eq!(dashboard.watch_error(), Some("RPC error: again"));

        dashboard.apply(Update::Events(Vec::new()));
        assert_eq!(dashboard.watch_error(), None);
    }

    #[test]
    fn test_unresolved_builders() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkChanged(10));
        dashboard.apply(Update::Events(vec![
            CheckInEvent::for_builder(ALICE),
            CheckInEvent::for_builder(BOB),
        ]));
        dashboard.apply(Update::Name(ALICE, Fetch::Ready(None)));
        dashboard.apply(Update::Name(BOB, Fetch::Failed("timeout".to_string())));

        assert_eq!(dashboard.unresolved_builders(), vec![BOB]);

        let disabled = Dashboard::new(&DashboardConfig::default(), false);
        assert!(disabled.unresolved_builders().is_empty());
    }

    #[test]
    fn test_network_failure_is_cleared_by_next_read() {
        let mut dashboard = dashboard();
        dashboard.apply(Update::NetworkFailed("RPC error: down".to_string()));
        assert_eq!(dashboard.network_error(), Some("RPC error: down"));

        dashboard.apply(Update::NetworkChanged(10));
        assert_eq!(dashboard.network_error(), None);
        assert!(dashboard.gate().is_open());
    }
}
