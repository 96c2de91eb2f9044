pub mod adapter;
pub mod bus;
pub mod connect;
pub mod resilience;
pub mod unit;

pub use adapter::{AdapterError, ConnectionStatus};
pub use unit::{Price, PriceStep, Qty};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Market segment codes as the gateway numbers them in subscribe requests
/// and in byte 0 of the binary tick frame.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, enum_map::Enum, PartialOrd, Ord,
)]
pub enum ExchangeSegment {
    NseCash,
    NseFutures,
    BseCash,
    BseFutures,
    McxFutures,
    CdeFutures,
}

impl ExchangeSegment {
    pub const ALL: [ExchangeSegment; 6] = [
        ExchangeSegment::NseCash,
        ExchangeSegment::NseFutures,
        ExchangeSegment::BseCash,
        ExchangeSegment::BseFutures,
        ExchangeSegment::McxFutures,
        ExchangeSegment::CdeFutures,
    ];

    pub fn code(self) -> u8 {
        match self {
            ExchangeSegment::NseCash => 1,
            ExchangeSegment::NseFutures => 2,
            ExchangeSegment::BseCash => 3,
            ExchangeSegment::BseFutures => 4,
            ExchangeSegment::McxFutures => 5,
            ExchangeSegment::CdeFutures => 13,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ExchangeSegment::NseCash),
            2 => Some(ExchangeSegment::NseFutures),
            3 => Some(ExchangeSegment::BseCash),
            4 => Some(ExchangeSegment::BseFutures),
            5 => Some(ExchangeSegment::McxFutures),
            13 => Some(ExchangeSegment::CdeFutures),
            _ => None,
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ExchangeSegment::NseCash => "NSE",
                ExchangeSegment::NseFutures => "NFO",
                ExchangeSegment::BseCash => "BSE",
                ExchangeSegment::BseFutures => "BFO",
                ExchangeSegment::McxFutures => "MCX",
                ExchangeSegment::CdeFutures => "CDS",
            }
        )
    }
}

/// Subscription depth requested from the gateway.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SubscriptionMode {
    Ltp,
    #[default]
    Quote,
    SnapQuote,
}

impl SubscriptionMode {
    pub fn code(self) -> u8 {
        match self {
            SubscriptionMode::Ltp => 1,
            SubscriptionMode::Quote => 2,
            SubscriptionMode::SnapQuote => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, PartialOrd, Ord)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
    ];

    pub fn to_minutes(self) -> u16 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
        }
    }

    pub fn to_milliseconds(self) -> u64 {
        u64::from(self.to_minutes()) * 60_000
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Timeframe::M1 => "1m",
                Timeframe::M3 => "3m",
                Timeframe::M5 => "5m",
                Timeframe::M15 => "15m",
                Timeframe::M30 => "30m",
                Timeframe::H1 => "1h",
            }
        )
    }
}

impl From<Timeframe> for u64 {
    fn from(timeframe: Timeframe) -> u64 {
        timeframe.to_milliseconds()
    }
}

/// One tradable instrument as the caller identifies it: the gateway keys
/// subscriptions by (segment, token string) and tick frames by the numeric
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Instrument {
    pub segment: ExchangeSegment,
    pub token: u32,
    /// Instrument tick size, used to snap cell prices
    #[serde(rename = "tickSize")]
    pub tick_size: PriceStep,
}

impl Instrument {
    pub fn new(segment: ExchangeSegment, token: u32, tick_size: f32) -> Self {
        Self {
            segment,
            token,
            tick_size: PriceStep::from_f32(tick_size),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.token)
    }
}

/// One market event from the gateway. Immutable once decoded; the
/// aggregator consumes each tick exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Receive time in ms. The binary frame carries no exchange timestamp,
    /// so bucketing follows arrival order.
    pub time: u64,
    pub segment: ExchangeSegment,
    pub token: u32,
    /// true when the trade printed on a downtick (seller-initiated)
    pub is_sell: bool,
    pub last_price: Price,
    pub last_qty: Qty,
    pub avg_price: Price,
    /// cumulative session volume
    pub volume: Qty,
    pub total_buy_qty: Qty,
    pub total_sell_qty: Qty,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub open_interest: u32,
}

/// Credentials handed to the client by the session layer. The client never
/// authenticates by itself; `connect()` fails fast when this is incomplete.
#[derive(Debug, Clone, Default)]
pub struct FeedSession {
    pub api_key: String,
    pub client_code: String,
    pub feed_token: String,
}

impl FeedSession {
    pub fn new(api_key: &str, client_code: &str, feed_token: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client_code: client_code.to_string(),
            feed_token: feed_token.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.client_code.is_empty() && !self.feed_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_codes_round_trip() {
        for segment in ExchangeSegment::ALL {
            assert_eq!(ExchangeSegment::from_code(segment.code()), Some(segment));
        }
        assert_eq!(ExchangeSegment::from_code(0), None);
        assert_eq!(ExchangeSegment::from_code(99), None);
    }

    #[test]
    fn incomplete_session_is_rejected() {
        assert!(!FeedSession::default().is_complete());
        assert!(!FeedSession::new("key", "", "token").is_complete());
        assert!(FeedSession::new("key", "A123", "token").is_complete());
    }
}
