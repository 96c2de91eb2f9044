use crate::{ExchangeSegment, Instrument, SubscriptionMode};

use enum_map::EnumMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod smartapi;

pub const ACTION_SUBSCRIBE: u8 = 1;
pub const ACTION_UNSUBSCRIBE: u8 = 0;

#[derive(thiserror::Error, Debug, Clone)]
pub enum AdapterError {
    #[error("Authentication: {0}")]
    Auth(String),
    #[error("Parsing: {0}")]
    Parse(String),
    #[error("Stream: {0}")]
    Websocket(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AdapterError {
    pub fn to_user_message(&self) -> &'static str {
        match self {
            AdapterError::Auth(err) => {
                log::error!("Feed auth error: {err}");
                "No valid session for the market feed. Log in again."
            }
            AdapterError::Parse(err) => {
                log::error!("Feed parse error: {err}");
                "Unexpected data from the market feed. Check logs for details."
            }
            AdapterError::Websocket(err) => {
                log::error!("Feed websocket error: {err}");
                "Realtime connection error. Trying to reconnect..."
            }
            AdapterError::InvalidRequest(err) => {
                log::error!("Feed invalid request: {err}");
                "Invalid request made to the market feed. Check logs for details."
            }
        }
    }
}

/// Lifecycle of the feed connection, surfaced to the UI as a live/stale
/// indicator. `GivenUp` is terminal and reported exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting(u32),
    GivenUp,
}

impl ConnectionStatus {
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::GivenUp)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Reconnecting(attempt) => write!(f, "Reconnecting ({attempt})"),
            ConnectionStatus::GivenUp => write!(f, "Gave up"),
        }
    }
}

/// Feed health counters. Decode failures and reconnects are counted rather
/// than swallowed so a systematically misaligned frame layout shows up
/// instead of silently dropping every tick.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub ticks: AtomicU64,
    pub decode_failures: AtomicU64,
    pub reconnects: AtomicU64,
}

impl FeedStats {
    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStatsSnapshot {
    pub ticks: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
}

/// Outgoing (un)subscribe message, in the gateway's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    pub action: u8,
    pub params: SubscribeParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub mode: u8,
    #[serde(rename = "tokenList")]
    pub token_list: Vec<TokenList>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenList {
    #[serde(rename = "exchangeType")]
    pub exchange_type: u8,
    pub tokens: Vec<String>,
}

static CORRELATION_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_correlation_id() -> String {
    format!("tickflow-{}", CORRELATION_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Canonical token grouping for a request: tokens bucketed per segment,
/// deduplicated and sorted, segments in code order. Two requests naming the
/// same instruments in any order normalize to the same token list.
fn normalize_token_list(instruments: &[Instrument]) -> Vec<TokenList> {
    let mut buckets: EnumMap<ExchangeSegment, BTreeSet<u32>> = EnumMap::default();

    for instrument in instruments {
        buckets[instrument.segment].insert(instrument.token);
    }

    ExchangeSegment::ALL
        .iter()
        .filter_map(|segment| {
            let tokens = &buckets[*segment];
            if tokens.is_empty() {
                return None;
            }
            Some(TokenList {
                exchange_type: segment.code(),
                tokens: tokens.iter().map(u32::to_string).collect(),
            })
        })
        .collect()
}

/// The stored subscription set, keyed by the normalized serialization of
/// each request. Resending an identical subscription only refreshes the
/// stored copy; every entry is replayed on (re)connect.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: FxHashMap<String, SubscribeRequest>,
}

impl SubscriptionSet {
    fn key(mode: SubscriptionMode, token_list: &[TokenList]) -> String {
        let body = serde_json::to_string(token_list).expect("subscription key serialization");
        format!("{}:{}", mode.code(), body)
    }

    /// Store a subscription; returns the wire message to send. Idempotent
    /// with respect to the stored set.
    pub fn subscribe(
        &mut self,
        mode: SubscriptionMode,
        instruments: &[Instrument],
    ) -> Option<SubscribeRequest> {
        let token_list = normalize_token_list(instruments);
        if token_list.is_empty() {
            return None;
        }

        let request = SubscribeRequest {
            correlation_id: next_correlation_id(),
            action: ACTION_SUBSCRIBE,
            params: SubscribeParams {
                mode: mode.code(),
                token_list,
            },
        };

        self.entries
            .insert(Self::key(mode, &request.params.token_list), request.clone());
        Some(request)
    }

    /// Drop a stored subscription; returns the unsubscribe wire message if
    /// anything was actually registered under the normalized key.
    pub fn unsubscribe(
        &mut self,
        mode: SubscriptionMode,
        instruments: &[Instrument],
    ) -> Option<SubscribeRequest> {
        let token_list = normalize_token_list(instruments);
        let stored = self.entries.remove(&Self::key(mode, &token_list))?;

        Some(SubscribeRequest {
            correlation_id: stored.correlation_id,
            action: ACTION_UNSUBSCRIBE,
            params: stored.params,
        })
    }

    /// Everything to replay after a (re)connect, so callers never need to
    /// know whether they are on their first or nth connection.
    pub fn replay(&self) -> impl Iterator<Item = &SubscribeRequest> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
