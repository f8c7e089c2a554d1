//! REST polling venue.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client as HttpClient;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::utils::DepthData;
use super::{ExchangeError, Result, VenueConnector, VenueEvent, VenueEventSender, fill_at_limit};
use crate::config::ExchangeConfig;
use crate::domain::{OrderBookSnapshot, OrderRequest, OrderResult};

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of levels requested.
const DEFAULT_DEPTH: u16 = 20;

/// Default interval between two polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fetches depth snapshots over HTTP.
#[derive(Clone)]
struct DepthClient {
    venue: String,
    url: String,
    depth: u16,
    http_client: HttpClient,
}

impl DepthClient {
    /// GET `<url>?symbol=<instrument>&limit=<depth>`.
    async fn fetch(&self, instrument: &str) -> Result<OrderBookSnapshot> {
        let limit = self.depth.to_string();
        let response = self
            .http_client
            .get(&self.url)
            .query(&[("symbol", instrument), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Api(format!("{}: {}", status, body)));
        }

        let depth: DepthData = response
            .json()
            .await
            .map_err(|e| ExchangeError::Api(format!("invalid depth payload: {}", e)))?;

        Ok(depth.into_snapshot(&self.venue, instrument, Utc::now()))
    }
}

/// PollingVenue reads books from a REST depth endpoint on a fixed interval.
pub struct PollingVenue {
    name: String,
    client: DepthClient,
    poll_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingVenue {
    /// Creates a polling venue. Requires `rest_url`.
    pub fn from_config(name: &str, config: &ExchangeConfig) -> Result<Self> {
        let url = config
            .rest_url
            .clone()
            .ok_or_else(|| ExchangeError::Internal(format!("{} has no rest_url", name)))?;

        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::Internal(format!("failed to build http client: {}", e)))?;

        let poll_interval = if config.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            config.poll_interval
        };

        Ok(Self {
            name: name.to_string(),
            client: DepthClient {
                venue: name.to_string(),
                url,
                depth: config.depth.unwrap_or(DEFAULT_DEPTH),
                http_client,
            },
            poll_interval,
            task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl VenueConnector for PollingVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, instruments: Vec<String>, events: VenueEventSender) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(exchange = %self.name, "Poller already running");
            return Ok(());
        }

        let client = self.client.clone();
        let poll_interval = self.poll_interval;

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                for instrument in &instruments {
                    let event = match client.fetch(instrument).await {
                        Ok(snapshot) => VenueEvent::OrderBook(snapshot),
                        Err(e) => {
                            warn!(exchange = %client.venue, instrument = %instrument, error = %e, "Depth poll failed");
                            VenueEvent::Error {
                                venue: client.venue.clone(),
                                message: e.to_string(),
                            }
                        }
                    };
                    if events.send(event).is_err() {
                        debug!(exchange = %client.venue, "Event channel closed, stopping poller");
                        return;
                    }
                }
            }
        }));

        info!(exchange = %self.name, interval = ?self.poll_interval, "Polling exchange started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!(exchange = %self.name, "Polling exchange stopped");
        }
        Ok(())
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderResult> {
        if self.task.lock().await.is_none() {
            return Err(ExchangeError::NotRunning(self.name.clone()));
        }
        debug!(exchange = %self.name, request = ?request, "Order acknowledged at limit");
        Ok(fill_at_limit(&request))
    }
}
