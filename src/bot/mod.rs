//! Main arbitrage bot implementation.
//!
//! Wires the components together: venue connectors, event bus, order book
//! router, opportunity detector, execution engine, trade store and metrics.

mod config;
mod error;
mod pipeline;

pub use config::{BotConfig, ReplayConfig};
pub use error::BotError;
pub use pipeline::Pipeline;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::ExecutionSignal;
use crate::events::EventBus;
use crate::exchanges::{ConnectorRegistry, VenueEvent};
use crate::execution::ExecutionEngine;
use crate::market::OrderBookRouter;
use crate::market::replay::replay_file;
use crate::monitoring::{Stats, StatsCollector};
use crate::storage::{MemoryTradeStore, SqliteTradeStore, SqliteTradeStoreConfig, TradeStore};
use crate::strategy::OpportunityDetector;

/// Main arbitrage bot that owns every component until it runs.
pub struct Bot {
    cfg: Config,
    version: String,
    replay: Option<ReplayConfig>,
    connectors: Arc<ConnectorRegistry>,
    store: Arc<dyn TradeStore>,
    pipeline: Pipeline,
    engine: ExecutionEngine,
    signals: mpsc::UnboundedReceiver<ExecutionSignal>,
    stats: StatsCollector,
    events_tx: mpsc::UnboundedSender<VenueEvent>,
}

impl Bot {
    /// Creates a new Bot instance. Nothing is started yet.
    ///
    /// Replay mode always simulates execution: the connectors are never
    /// started, so live orders could not be placed.
    pub async fn new(cfg: BotConfig) -> Result<Self, BotError> {
        let mut app_config = cfg.app_config;

        if cfg.replay.is_some() && !app_config.dry_run.enabled {
            warn!("Replay mode forces dry run");
            app_config.dry_run.enabled = true;
        }

        let mut bus = EventBus::new();
        let signals = bus.subscribe_signals();
        let reports = bus.subscribe_executions();
        let stats = StatsCollector::subscribe(&mut bus, app_config.monitoring.stats_interval);
        let bus = Arc::new(bus);

        let connectors = Arc::new(ConnectorRegistry::from_config(&app_config)?);
        let store = Self::open_store(&app_config).await?;

        let router = OrderBookRouter::new(Arc::clone(&bus));
        let detector = OpportunityDetector::from_config(&app_config, Arc::clone(&bus))?;
        let engine = ExecutionEngine::from_config(
            &app_config,
            Arc::clone(&connectors),
            Arc::clone(&bus),
            Arc::clone(&store),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pipeline = Pipeline::new(router, detector, events_rx, reports);

        Ok(Self {
            cfg: app_config,
            version: cfg.version,
            replay: cfg.replay,
            connectors,
            store,
            pipeline,
            engine,
            signals,
            stats,
            events_tx,
        })
    }

    async fn open_store(cfg: &Config) -> Result<Arc<dyn TradeStore>, BotError> {
        if !cfg.storage.enabled {
            info!("Trade storage disabled, keeping trades in memory");
            return Ok(Arc::new(MemoryTradeStore::new()));
        }

        let store = SqliteTradeStore::new(SqliteTradeStoreConfig::new(&cfg.storage.path)).await?;
        Ok(Arc::new(store))
    }

    /// Runs until Ctrl-C, or until the replay file is exhausted.
    pub async fn run(self) -> Result<Stats, BotError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await
    }

    /// Runs until `stop` resolves or the feeds close, then shuts down in
    /// order: feeds, pipeline, engine (draining in-flight trades), store,
    /// metrics.
    pub async fn run_until<F>(self, stop: F) -> Result<Stats, BotError>
    where
        F: Future<Output = ()>,
    {
        let Bot {
            cfg,
            version,
            replay,
            connectors,
            store,
            pipeline,
            engine,
            signals,
            stats,
            events_tx,
        } = self;

        let started_at = Instant::now();

        info!(
            name = %cfg.app.name,
            env = %cfg.app.env,
            version = %version,
            dry_run = engine.is_dry_run(),
            exchanges = ?connectors.list(),
            pairs = ?cfg.pairs,
            replay = ?replay.as_ref().map(|r| r.path.display().to_string()),
            "Starting arbitrage bot"
        );

        let (pipeline_stop, pipeline_shutdown) = watch::channel(false);
        let (engine_stop, engine_shutdown) = watch::channel(false);
        let (stats_stop, stats_shutdown) = watch::channel(false);

        let stats_task = tokio::spawn(stats.run(stats_shutdown));
        let engine_task = tokio::spawn(engine.run(signals, engine_shutdown));
        let mut pipeline_task = tokio::spawn(pipeline.run(pipeline_shutdown));

        let feed = match replay {
            Some(replay) => {
                let events = events_tx.clone();
                Some(tokio::spawn(async move {
                    replay_file(&replay.path, replay.speed, events).await
                }))
            }
            None => {
                if let Err(e) = connectors.start_all(&cfg.pairs, events_tx.clone()).await {
                    connectors.stop_all().await;
                    return Err(e.into());
                }
                None
            }
        };
        // Connectors and the replay task hold their own senders.
        drop(events_tx);

        let pipeline_done = tokio::select! {
            _ = stop => None,
            result = &mut pipeline_task => Some(result),
        };

        info!("Stopping bot...");

        if feed.is_none() {
            connectors.stop_all().await;
        }
        let _ = pipeline_stop.send(true);
        let snapshots = match pipeline_done {
            Some(result) => result?,
            None => pipeline_task.await?,
        };

        let mut replay_failure = None;
        if let Some(feed) = feed {
            feed.abort();
            match feed.await {
                Ok(Err(e)) => {
                    error!(error = %e, "Replay failed");
                    replay_failure = Some(e);
                }
                Ok(Ok(_)) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let _ = engine_stop.send(true);
        engine_task.await?;

        match (store.count().await, store.total_pnl().await) {
            (Ok(trades), Ok(pnl)) => info!(trades, pnl = %pnl, "Trade store totals"),
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "Failed to read trade store totals"),
        }
        if let Err(e) = store.close().await {
            warn!(error = %e, "Failed to close trade store");
        }

        let _ = stats_stop.send(true);
        let stats = stats_task.await?;

        info!(
            uptime = ?started_at.elapsed(),
            snapshots,
            "Bot stopped"
        );

        match replay_failure {
            Some(e) => Err(e.into()),
            None => Ok(stats),
        }
    }
}

#[cfg(test)]
mod tests;
