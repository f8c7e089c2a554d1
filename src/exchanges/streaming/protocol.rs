//! Wire formats of the supported depth streams.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::config::StreamProtocol;
use crate::domain::OrderBookSnapshot;
use crate::exchanges::utils::{DepthData, dashed_to_instrument, instrument_to_dashed, parse_levels};

/// Partial book depth requested from Binance-style venues.
const BINANCE_DEPTH_STREAM: &str = "depth20";

/// OKX order book channel.
const OKX_BOOK_CHANNEL: &str = "books5";

/// What to do with one inbound text frame.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// Zero or more books to publish.
    Books(Vec<OrderBookSnapshot>),
    /// A text frame to send back, e.g. a pong.
    Reply(String),
    /// Control or unrelated message.
    Ignore,
}

/// Builds the URL to connect to.
///
/// Binance-style venues are always read through the combined stream
/// endpoint, so the instruments are part of the URL.
pub(crate) fn stream_url(protocol: StreamProtocol, ws_url: &str, instruments: &[String]) -> String {
    match protocol {
        StreamProtocol::Okx => ws_url.to_string(),
        StreamProtocol::Binance => {
            let streams: Vec<String> = instruments
                .iter()
                .map(|i| format!("{}@{}", i.to_lowercase(), BINANCE_DEPTH_STREAM))
                .collect();

            let base = match ws_url.split_once("://") {
                Some((scheme, rest)) => {
                    let host = rest.split('/').next().unwrap_or(rest);
                    format!("{}://{}", scheme, host)
                }
                None => ws_url.trim_end_matches('/').to_string(),
            };

            format!("{}/stream?streams={}", base, streams.join("/"))
        }
    }
}

/// Builds the subscription frame sent after connecting, if any.
pub(crate) fn subscribe_message(protocol: StreamProtocol, instruments: &[String]) -> Option<String> {
    match protocol {
        StreamProtocol::Binance => None,
        StreamProtocol::Okx => {
            let args: Vec<serde_json::Value> = instruments
                .iter()
                .filter_map(|instrument| match instrument_to_dashed(instrument) {
                    Some(inst_id) => Some(json!({"channel": OKX_BOOK_CHANNEL, "instId": inst_id})),
                    None => {
                        warn!(instrument = %instrument, "Unsupported quote asset, not subscribing");
                        None
                    }
                })
                .collect();

            Some(json!({"op": "subscribe", "args": args}).to_string())
        }
    }
}

/// Keep-alive frame for the protocol.
pub(crate) fn ping_message(protocol: StreamProtocol) -> WsMessage {
    match protocol {
        StreamProtocol::Binance => WsMessage::Ping(Default::default()),
        StreamProtocol::Okx => WsMessage::Text("ping".into()),
    }
}

/// Parses one inbound text frame.
pub(crate) fn parse(
    protocol: StreamProtocol,
    venue: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Inbound, serde_json::Error> {
    match protocol {
        StreamProtocol::Binance => parse_binance(venue, text, now),
        StreamProtocol::Okx => parse_okx(venue, text, now),
    }
}

/// Combined stream envelope: {"stream":"btcusdt@depth20","data":{...}}
#[derive(Debug, Deserialize)]
struct BinanceEnvelope {
    stream: Option<String>,
    data: Option<DepthData>,
}

fn parse_binance(venue: &str, text: &str, now: DateTime<Utc>) -> Result<Inbound, serde_json::Error> {
    let envelope: BinanceEnvelope = serde_json::from_str(text)?;

    let Some(data) = envelope.data else {
        debug!(exchange = %venue, "Control message");
        return Ok(Inbound::Ignore);
    };

    let symbol = data.symbol.clone().or_else(|| {
        envelope
            .stream
            .as_deref()
            .and_then(|s| s.split('@').next())
            .map(str::to_uppercase)
    });

    match symbol {
        Some(symbol) => Ok(Inbound::Books(vec![data.into_snapshot(venue, &symbol, now)])),
        None => Ok(Inbound::Ignore),
    }
}

/// OKX push: {"arg":{"channel":"books5","instId":"BTC-USDT"},"data":[{...}]}
#[derive(Debug, Deserialize)]
struct OkxMessage {
    event: Option<String>,
    arg: Option<OkxArg>,
    #[serde(default)]
    data: Vec<OkxBook>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OkxArg {
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct OkxBook {
    #[serde(default)]
    bids: Vec<Vec<String>>,
    #[serde(default)]
    asks: Vec<Vec<String>>,
    ts: Option<String>,
}

fn parse_okx(venue: &str, text: &str, now: DateTime<Utc>) -> Result<Inbound, serde_json::Error> {
    if text == "pong" {
        return Ok(Inbound::Ignore);
    }

    let message: OkxMessage = serde_json::from_str(text)?;

    if let Some(event) = message.event.as_deref() {
        return Ok(match event {
            "ping" => Inbound::Reply(json!({"op": "pong"}).to_string()),
            "error" => {
                warn!(exchange = %venue, message = ?message.msg, "Stream reported an error");
                Inbound::Ignore
            }
            _ => {
                debug!(exchange = %venue, event = %event, "Control message");
                Inbound::Ignore
            }
        });
    }

    let Some(arg) = message.arg else {
        return Ok(Inbound::Ignore);
    };
    let instrument = dashed_to_instrument(&arg.inst_id);

    let books = message
        .data
        .into_iter()
        .map(|book| {
            let sequence = book.ts.as_deref().and_then(|ts| ts.parse().ok()).unwrap_or(0);
            OrderBookSnapshot::new(
                venue,
                instrument.as_str(),
                parse_levels(&book.bids),
                parse_levels(&book.asks),
                sequence,
                now,
            )
        })
        .collect();

    Ok(Inbound::Books(books))
}
