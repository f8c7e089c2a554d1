//! WebSocket depth-stream venue.

mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use self::protocol::Inbound;
use super::{ExchangeError, Result, VenueConnector, VenueEvent, VenueEventSender, fill_at_limit};
use crate::config::{ExchangeConfig, StreamProtocol};
use crate::domain::{OrderRequest, OrderResult};

/// Default interval to send ping messages.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(20);

/// Default delay before reconnecting.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;
type WsError = tokio_tungstenite::tungstenite::Error;

/// Why a read loop returned.
enum Disconnect {
    /// Consumer went away; the session ends.
    Stopped,
    /// Connection lost; reconnect.
    Lost(String),
    /// Unrecoverable error; the session ends.
    Fatal(String),
}

/// StreamingVenue reads books from a venue's public WebSocket feed.
pub struct StreamingVenue {
    name: String,
    protocol: StreamProtocol,
    ws_url: String,
    ping_interval: Duration,
    reconnect_delay: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingVenue {
    /// Creates a streaming venue. Requires `protocol` and `ws_url`.
    pub fn from_config(name: &str, config: &ExchangeConfig) -> Result<Self> {
        let protocol = config
            .protocol
            .ok_or_else(|| ExchangeError::Internal(format!("{} has no stream protocol", name)))?;
        let ws_url = config
            .ws_url
            .clone()
            .ok_or_else(|| ExchangeError::Internal(format!("{} has no ws_url", name)))?;

        let (ping_interval, reconnect_delay) = config
            .websocket
            .as_ref()
            .map(|ws| (ws.ping_interval, ws.reconnect_delay))
            .unwrap_or((DEFAULT_PING_INTERVAL, DEFAULT_RECONNECT_DELAY));

        Ok(Self {
            name: name.to_string(),
            protocol,
            ws_url,
            ping_interval: non_zero_or(ping_interval, DEFAULT_PING_INTERVAL),
            reconnect_delay: non_zero_or(reconnect_delay, DEFAULT_RECONNECT_DELAY),
            task: Mutex::new(None),
        })
    }
}

fn non_zero_or(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

#[async_trait]
impl VenueConnector for StreamingVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, instruments: Vec<String>, events: VenueEventSender) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(exchange = %self.name, "Stream already running");
            return Ok(());
        }

        let session = Session {
            venue: self.name.clone(),
            protocol: self.protocol,
            url: protocol::stream_url(self.protocol, &self.ws_url, &instruments),
            subscribe: protocol::subscribe_message(self.protocol, &instruments),
            ping_interval: self.ping_interval,
            reconnect_delay: self.reconnect_delay,
            events,
        };

        let (sink, source) = session
            .connect()
            .await
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;

        *task = Some(tokio::spawn(session.run(sink, source)));

        info!(exchange = %self.name, instruments = ?instruments, "Streaming exchange started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            info!(exchange = %self.name, "Streaming exchange stopped");
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

/// One running feed: connection, keep-alive and reconnects.
struct Session {
    venue: String,
    protocol: StreamProtocol,
    url: String,
    subscribe: Option<String>,
    ping_interval: Duration,
    reconnect_delay: Duration,
    events: VenueEventSender,
}

impl Session {
    /// Connects and sends the subscription frame.
    async fn connect(&self) -> std::result::Result<(WsSink, WsSource), WsError> {
        info!(exchange = %self.venue, url = %self.url, "connecting to websocket");

        let (ws_stream, _response) = connect_async(&self.url).await.map_err(|e| {
            error!(exchange = %self.venue, error = %e, url = %self.url, "failed to connect to websocket");
            e
        })?;

        let (mut sink, source) = ws_stream.split();

        if let Some(message) = &self.subscribe {
            sink.send(WsMessage::Text(message.clone().into())).await?;
            info!(exchange = %self.venue, "subscribed to order books");
        }

        Ok((sink, source))
    }

    /// Reads until the consumer goes away, reconnecting on lost connections.
    async fn run(self, mut sink: WsSink, mut source: WsSource) {
        loop {
            let reason = self.read_loop(&mut sink, &mut source).await;
            let _ = sink.close().await;

            match reason {
                Disconnect::Stopped => break,
                Disconnect::Fatal(message) => {
                    error!(exchange = %self.venue, error = %message, "websocket error (non-recoverable)");
                    self.report(message);
                    break;
                }
                Disconnect::Lost(message) => {
                    warn!(exchange = %self.venue, reason = %message, "websocket disconnected, scheduling reconnect");
                    self.report(message);
                }
            }

            match self.reconnect().await {
                Some((new_sink, new_source)) => {
                    sink = new_sink;
                    source = new_source;
                }
                None => break,
            }
        }

        debug!(exchange = %self.venue, "websocket session ended");
    }

    /// Retries until connected. Returns None once the consumer is gone.
    async fn reconnect(&self) -> Option<(WsSink, WsSource)> {
        loop {
            if self.events.is_closed() {
                return None;
            }

            info!(exchange = %self.venue, delay = ?self.reconnect_delay, "reconnecting");
            tokio::time::sleep(self.reconnect_delay).await;

            match self.connect().await {
                Ok(connection) => return Some(connection),
                Err(e) => self.report(format!("reconnect failed: {}", e)),
            }
        }
    }

    async fn read_loop(&self, sink: &mut WsSink, source: &mut WsSource) -> Disconnect {
        let mut ping = tokio::time::interval(self.ping_interval);
        ping.tick().await;

        loop {
            tokio::select! {
                msg = source.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(reason) = self.handle_text(sink, text.as_str()).await {
                                return reason;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            return Disconnect::Lost("closed by server".to_string());
                        }
                        Some(Ok(_)) => {
                            // Ping, Pong and Binary frames carry no books.
                        }
                        Some(Err(e)) => {
                            return if should_reconnect(&e) {
                                Disconnect::Lost(e.to_string())
                            } else {
                                Disconnect::Fatal(e.to_string())
                            };
                        }
                        None => return Disconnect::Lost("stream ended".to_string()),
                    }
                }
                _ = ping.tick() => {
                    if let Err(e) = sink.send(protocol::ping_message(self.protocol)).await {
                        warn!(exchange = %self.venue, error = %e, "ping failed");
                    } else {
                        debug!(exchange = %self.venue, "ping sent");
                    }
                }
            }
        }
    }

    async fn handle_text(&self, sink: &mut WsSink, text: &str) -> Option<Disconnect> {
        match protocol::parse(self.protocol, &self.venue, text, Utc::now()) {
            Ok(Inbound::Books(books)) => {
                for book in books {
                    if self.events.send(VenueEvent::OrderBook(book)).is_err() {
                        return Some(Disconnect::Stopped);
                    }
                }
            }
            Ok(Inbound::Reply(reply)) => {
                if let Err(e) = sink.send(WsMessage::Text(reply.into())).await {
                    return Some(Disconnect::Lost(e.to_string()));
                }
            }
            Ok(Inbound::Ignore) => {}
            Err(e) => {
                warn!(exchange = %self.venue, error = %e, "websocket parse error");
            }
        }
        None
    }

    fn report(&self, message: String) {
        let _ = self.events.send(VenueEvent::Error {
            venue: self.venue.clone(),
            message,
        });
    }
}

/// Returns true if the error warrants a reconnection attempt.
fn should_reconnect(error: &WsError) -> bool {
    use tokio_tungstenite::tungstenite::Error;
    matches!(
        error,
        Error::ConnectionClosed | Error::AlreadyClosed | Error::Io(_) | Error::Tls(_) | Error::Http(_)
    )
}
