//! Registry resolving venue connectors by name.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use tracing::{error, info};

use super::{
    ExchangeError, PollingVenue, Result, SimulatedVenue, StreamingVenue, VenueConnector,
    VenueEventSender,
};
use crate::config::{Config, ExchangeConfig, Transport};

/// ConnectorRegistry owns one connector per enabled venue. It is built once
/// at start and shared read-only afterwards.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn VenueConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector for every enabled venue in the configuration.
    ///
    /// With `dry_run.seed` set, simulated feeds are seeded too; each venue
    /// offsets the seed by its position in name order.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        for (index, (name, exchange_config)) in config.enabled_venues().into_iter().enumerate() {
            info!(exchange = %name, transport = ?exchange_config.transport, "Loading exchange from config");
            let seed = config.dry_run.seed.map(|seed| seed.wrapping_add(index as u64));
            let connector = Self::create_connector(name, exchange_config, seed)?;
            registry.register(connector);
        }

        Ok(registry)
    }

    /// Factory creating a connector for the configured transport.
    fn create_connector(
        name: &str,
        config: &ExchangeConfig,
        seed: Option<u64>,
    ) -> Result<Arc<dyn VenueConnector>> {
        let connector: Arc<dyn VenueConnector> = match config.transport {
            Transport::Simulated => {
                let venue = SimulatedVenue::new(name, config);
                Arc::new(match seed {
                    Some(seed) => venue.with_seed(seed),
                    None => venue,
                })
            }
            Transport::Streaming => Arc::new(StreamingVenue::from_config(name, config)?),
            Transport::Polling => Arc::new(PollingVenue::from_config(name, config)?),
        };
        Ok(connector)
    }

    /// Registers a connector, replacing any with the same name.
    pub fn register(&mut self, connector: Arc<dyn VenueConnector>) {
        let name = connector.name().to_string();
        info!(exchange = %name, "Registering exchange");
        self.connectors.insert(name, connector);
    }

    /// Returns the connector for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn VenueConnector>> {
        self.connectors.get(name).cloned()
    }

    /// Returns all registered venue names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Starts every connector concurrently and waits until all are ready.
    pub async fn start_all(&self, instruments: &[String], events: VenueEventSender) -> Result<()> {
        let starts = self.connectors.iter().map(|(name, connector)| {
            let events = events.clone();
            async move {
                info!(exchange = %name, "Starting exchange");
                connector.start(instruments.to_vec(), events).await.map_err(|e| {
                    error!(exchange = %name, error = %e, "Failed to start exchange");
                    e
                })
            }
        });

        try_join_all(starts).await?;
        Ok(())
    }

    /// Stops every connector. Failures are logged and do not stop the others.
    pub async fn stop_all(&self) {
        let stops = self.connectors.iter().map(|(name, connector)| async move {
            if let Err(e) = connector.stop().await {
                error!(exchange = %name, error = %e, "Failed to stop exchange");
            }
        });

        join_all(stops).await;
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("venues", &self.list())
            .finish()
    }
}
