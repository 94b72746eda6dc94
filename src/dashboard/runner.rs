use alloy::primitives::Address;
use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{
    source::{CheckInSource, Fetch, NameResolver},
    view::{self, Layout},
    Dashboard, Update,
};
use crate::ethereum::{utils, CheckInEvent};

/// Name lookups attempted per refresh round.
const MAX_NAME_LOOKUPS_PER_TICK: usize = 4;
/// Upper bound on the rounds skipped after repeated failed lookups.
const MAX_NAME_BACKOFF_TICKS: u64 = 64;

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub from_block: u64,
    /// Keep polling for new blocks once history is loaded
    pub watch: bool,
    pub max_block_range: u64,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct NameRetry {
    failures: u32,
    next_tick: u64,
}

/// Drives a [`Dashboard`] from chain reads on a fixed poll interval.
pub struct Runner {
    source: Box<dyn CheckInSource>,
    names: Option<Box<dyn NameResolver>>,
    options: RunnerOptions,
    dashboard: Dashboard,
    /// Next block to scan for events
    next_block: u64,
    /// Events from history chunks fetched before the full history is in
    pending: Vec<CheckInEvent>,
    history_loaded: bool,
    /// Refresh rounds started so far
    tick: u64,
    name_retries: HashMap<Address, NameRetry>,
}

impl Runner {
    pub fn new(
        source: Box<dyn CheckInSource>,
        names: Option<Box<dyn NameResolver>>,
        options: RunnerOptions,
        dashboard: Dashboard,
    ) -> Self {
        Self {
            source,
            names,
            next_block: options.from_block,
            options,
            dashboard,
            pending: Vec::new(),
            history_loaded: false,
            tick: 0,
            name_retries: HashMap::new(),
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// One round of reads: network, counter, new events, then missing names.
    pub async fn refresh(&mut self) {
        let mut quiet = |_: &Dashboard| -> Result<()> { Ok(()) };
        if let Err(e) = self.refresh_and_show(&mut quiet).await {
            warn!("Refresh failed: {}", e);
        }
    }

    /// Like [`Runner::refresh`], calling `show` after every step that can change
    /// the view.
    ///
    /// Dropping the returned future between steps is safe: the scan cursor and
    /// the partial history are only updated together, after a chunk arrived.
    async fn refresh_and_show<F>(&mut self, show: &mut F) -> Result<()>
    where
        F: FnMut(&Dashboard) -> Result<()>,
    {
        self.tick += 1;

        match self.source.chain_id().await {
            Ok(chain_id) => self.dashboard.apply(Update::NetworkChanged(chain_id)),
            Err(e) => {
                warn!("Failed to read chain id: {}", e);
                self.dashboard.apply(Update::NetworkFailed(e.to_string()));
            }
        }
        show(&self.dashboard)?;

        let counter = self.source.checked_in_counter().await;
        if let Err(e) = &counter {
            warn!("Failed to read checkedInCounter: {}", e);
        }
        self.dashboard.apply(Update::Counter(Fetch::from_result(counter)));
        show(&self.dashboard)?;

        // Event reads are only enabled on the required network.
        if self.dashboard.gate().is_open() {
            self.refresh_events(show).await?;
            show(&self.dashboard)?;
        }

        self.refresh_names(show).await
    }

    async fn refresh_events<F>(&mut self, show: &mut F) -> Result<()>
    where
        F: FnMut(&Dashboard) -> Result<()>,
    {
        if self.history_loaded && !self.options.watch {
            return Ok(());
        }

        let latest = match self.source.latest_block().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!("Failed to read latest block: {}", e);
                self.dashboard.apply(Update::EventsFailed(e.to_string()));
                return Ok(());
            }
        };

        for range in utils::block_ranges(self.next_block, latest, self.options.max_block_range) {
            let (from, to) = (*range.start(), *range.end());
            match self.source.check_in_events(from, to).await {
                Ok(events) => {
                    debug!("Blocks {}..={}: {} check-in(s)", from, to, events.len());
                    self.next_block = to.saturating_add(1);
                    if !self.history_loaded {
                        self.pending.extend(events);
                    } else if !events.is_empty() || self.dashboard.watch_error().is_some() {
                        self.dashboard.apply(Update::Events(events));
                    }
                    show(&self.dashboard)?;
                }
                Err(e) => {
                    warn!("Failed to fetch check-ins in blocks {}..={}: {}", from, to, e);
                    self.dashboard.apply(Update::EventsFailed(e.to_string()));
                    return Ok(());
                }
            }
        }

        if !self.history_loaded {
            let history = std::mem::take(&mut self.pending);
            info!(
                "Loaded {} check-in event(s) up to block {}",
                history.len(),
                latest
            );
            self.history_loaded = true;
            self.dashboard.apply(Update::Events(history));
        } else if self.dashboard.watch_error().is_some() {
            self.dashboard.apply(Update::Events(Vec::new()));
        }

        Ok(())
    }

    /// Looks up a bounded number of missing names. Addresses never tried come
    /// first; failed ones wait an exponentially growing number of rounds.
    async fn refresh_names<F>(&mut self, show: &mut F) -> Result<()>
    where
        F: FnMut(&Dashboard) -> Result<()>,
    {
        let Some(resolver) = &self.names else {
            return Ok(());
        };

        let tick = self.tick;
        let mut due: Vec<Address> = self
            .dashboard
            .unresolved_builders()
            .into_iter()
            .filter(|builder| {
                self.name_retries
                    .get(builder)
                    .map_or(true, |retry| retry.next_tick <= tick)
            })
            .collect();
        due.sort_by_key(|builder| self.name_retries.get(builder).map_or(0, |retry| retry.failures));
        due.truncate(MAX_NAME_LOOKUPS_PER_TICK);

        for builder in due {
            let name = match resolver.lookup(builder).await {
                Ok(name) => {
                    self.name_retries.remove(&builder);
                    Fetch::Ready(name)
                }
                Err(e) => {
                    let retry = self.name_retries.entry(builder).or_default();
                    retry.failures = retry.failures.saturating_add(1);
                    let wait = (1u64 << retry.failures.min(6)).min(MAX_NAME_BACKOFF_TICKS);
                    retry.next_tick = tick + wait;
                    debug!(
                        "Name lookup for {} failed, retrying in {} round(s): {}",
                        builder, wait, e
                    );
                    Fetch::Failed(e.to_string())
                }
            };
            self.dashboard.apply(Update::Name(builder, name));
            show(&self.dashboard)?;
        }

        Ok(())
    }

    /// Writes a frame right away, then refreshes on every tick and writes a new
    /// frame whenever the view changed, until `shutdown` completes.
    ///
    /// `shutdown` is also polled while a refresh is in flight, so a long history
    /// scan does not delay it.
    pub async fn run_until<W, F>(
        &mut self,
        layout: Layout,
        clear_screen: bool,
        out: &mut W,
        shutdown: F,
    ) -> Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut frames = Frames {
            layout,
            clear_screen,
            out,
            last: String::new(),
        };
        frames.show(&self.dashboard)?;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => break,
            }

            let mut show = |dashboard: &Dashboard| frames.show(dashboard);
            tokio::select! {
                result = self.refresh_and_show(&mut show) => result?,
                _ = &mut shutdown => break,
            }
        }

        info!("Shutting down dashboard");
        Ok(())
    }
}

/// Frame writer that skips frames identical to the previous one.
struct Frames<'a, W> {
    layout: Layout,
    clear_screen: bool,
    out: &'a mut W,
    last: String,
}

impl<W: Write> Frames<'_, W> {
    fn show(&mut self, dashboard: &Dashboard) -> Result<()> {
        let frame = view::render(dashboard, self.layout)?;
        if frame == self.last {
            return Ok(());
        }

        if self.clear_screen {
            write!(self.out, "\x1B[2J\x1B[1;1H")?;
        }
        writeln!(self.out, "{}", frame)?;
        self.out.flush()?;
        self.last = frame;
        Ok(())
    }
}
