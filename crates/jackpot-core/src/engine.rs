//! Engine composition: one tick drives generate, append, then broadcast.
//!
//! [`Engine`] wires a [`Generator`], the [`GenerationStore`], and the
//! [`SubscriberRegistry`] together and, on [`start`](Engine::start),
//! spawns two independent tokio tasks:
//!
//! - **tick task** -- the only writer of the store. Runs [`TickCycle::step`]
//!   once per tick period; a step runs to completion before the next one.
//! - **snapshot task** -- persists the store once per snapshot period.
//!   Write failures are logged and retried on the next period.
//!
//! Startup order is enforced by construction: an [`Engine`] can only be
//! built from a store that has already been opened.
//!
//! [`EngineHandle::shutdown`] cancels both schedules and flushes a final
//! snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, EngineConfig};
use crate::feed::Feed;
use crate::generator::{Generator, TickReport};
use crate::random::{self, RandomSource};
use crate::registry::SubscriberRegistry;
use crate::store::{GenerationStore, StoreError};

/// Errors surfaced by the engine lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The configuration was rejected.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The store could not be persisted.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// A scheduled task panicked or was aborted.
    #[error("engine task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

/// One generation tick: draw and commit, then fan out.
#[derive(Debug)]
pub struct TickCycle {
    generator: Generator,
    store: GenerationStore,
    registry: Arc<SubscriberRegistry>,
}

impl TickCycle {
    /// Assemble a tick cycle.
    pub const fn new(
        generator: Generator,
        store: GenerationStore,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            generator,
            store,
            registry,
        }
    }

    /// The generator driving this cycle.
    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Run exactly one tick.
    ///
    /// Returns `None` if the generator has stopped.
    pub fn step(&mut self) -> Option<TickReport> {
        let report = self.generator.tick(&self.store)?;

        if report.newly_completed {
            info!(
                value = report.record.value,
                timestamp = report.record.timestamp,
                generations = self.store.len(),
                "Target value generated"
            );
        }

        let delivery = self.registry.broadcast(report.record);
        debug!(
            value = report.record.value,
            delivered = delivery.delivered,
            failed = delivery.failed,
            "Tick complete"
        );

        Some(report)
    }
}

/// A configured, not yet running engine.
pub struct Engine {
    config: EngineConfig,
    store: GenerationStore,
    registry: Arc<SubscriberRegistry>,
    source: Box<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over an opened store.
    ///
    /// Uses the system clock and the random source selected by
    /// `generator.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if `config` fails validation.
    pub fn new(config: EngineConfig, store: GenerationStore) -> Result<Self, EngineError> {
        config.validate()?;
        let source = random::source_for_seed(config.generator.seed);
        Ok(Self {
            config,
            store,
            registry: Arc::new(SubscriberRegistry::new()),
            source,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the random source.
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn RandomSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the timestamp clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A feed usable before the engine starts (e.g. to pre-register
    /// subscribers).
    pub fn feed(&self) -> Feed {
        Feed::new(
            self.store.clone(),
            Arc::clone(&self.registry),
            self.config.subscribers.backlog_size,
        )
    }

    /// Spawn the tick and snapshot tasks.
    ///
    /// Must be called from within a tokio runtime. The first tick fires
    /// one tick period after this call.
    pub fn start(self) -> EngineHandle {
        let feed = self.feed();
        let tick_period = self.config.generator.tick_interval();
        let snapshot_period = self.config.persistence.snapshot_interval();

        info!(
            tick_interval_ms = self.config.generator.tick_interval_ms,
            snapshot_interval_ms = self.config.persistence.snapshot_interval_ms,
            target_value = self.config.generator.target_value,
            halt_on_completion = self.config.generator.halt_on_completion,
            generations = self.store.len(),
            completed = self.store.is_completed(),
            "Engine starting"
        );

        let generator = Generator::new(&self.config.generator, self.source, self.clock);
        let cycle = TickCycle::new(generator, self.store.clone(), Arc::clone(&self.registry));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick_task = tokio::spawn(run_ticks(cycle, tick_period, shutdown_rx.clone()));
        let snapshot_task = tokio::spawn(run_snapshots(
            self.store.clone(),
            snapshot_period,
            shutdown_rx,
        ));

        EngineHandle {
            feed,
            store: self.store,
            shutdown: shutdown_tx,
            tick_task,
            snapshot_task,
        }
    }
}

/// Handle to a running engine.
#[derive(Debug)]
pub struct EngineHandle {
    feed: Feed,
    store: GenerationStore,
    shutdown: watch::Sender<bool>,
    tick_task: JoinHandle<()>,
    snapshot_task: JoinHandle<()>,
}

impl EngineHandle {
    /// A cloneable query and subscription handle.
    pub fn feed(&self) -> Feed {
        self.feed.clone()
    }

    /// Whether the tick schedule is still active.
    ///
    /// Becomes `false` after shutdown, or once a halting generator stops.
    pub fn is_generating(&self) -> bool {
        !self.tick_task.is_finished()
    }

    /// Stop both schedules, wait for them, and write a final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Task`] if a task panicked, or
    /// [`EngineError::Store`] if the final snapshot cannot be written.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        self.shutdown.send_replace(true);

        self.tick_task.await.map_err(|e| EngineError::Task {
            message: format!("tick task: {e}"),
        })?;
        self.snapshot_task.await.map_err(|e| EngineError::Task {
            message: format!("snapshot task: {e}"),
        })?;

        self.store.persist().await?;
        info!(generations = self.store.len(), "Engine stopped, final snapshot written");
        Ok(())
    }
}

/// An interval whose first tick is one `period` from now.
fn delayed_interval(period: Duration) -> time::Interval {
    let now = Instant::now();
    let start = now.checked_add(period).unwrap_or(now);
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_ticks(mut cycle: TickCycle, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = delayed_interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if cycle.step().is_none() {
                    info!(
                        target_value = cycle.generator().target(),
                        "Generator stopped after completion, tick schedule cancelled"
                    );
                    return;
                }
            }
            _ = shutdown.changed() => {
                debug!("Tick task shutting down");
                return;
            }
        }
    }
}

async fn run_snapshots(
    store: GenerationStore,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = delayed_interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = store.persist().await {
                    warn!(error = %e, "Snapshot write failed, retrying next period");
                }
            }
            _ = shutdown.changed() => {
                debug!("Snapshot task shutting down");
                return;
            }
        }
    }
}
