use super::{AdapterError, ConnectionStatus, FeedStats, FeedStatsSnapshot, SubscriptionSet};
use crate::{
    ExchangeSegment, FeedSession, Instrument, SubscriptionMode, Tick,
    bus::{EventBus, ListenerGuard},
    connect::{self, State, connect_ws},
    resilience::{Reconnect, ReconnectPolicy},
    unit::{Price, Qty},
};

use bytes::Buf;
use fastwebsockets::{Frame, OpCode, Payload};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tokio::sync::mpsc;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const FEED_DOMAIN: &str = "smartapisocket.angelone.in";
const FEED_PATH: &str = "/smart-stream";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_MESSAGE: &str = "ping";

/// How long a single read may block before the loop services the heartbeat
/// and queued control messages.
const READ_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-offset binary tick frame: exchange byte, 4-byte token, then
/// little-endian 4-byte fields (prices scaled x100).
pub const TICK_FRAME_LEN: usize = 49;
const WIRE_PRICE_SCALE: u32 = 2;

/// Market feed client for the SmartAPI-style streaming gateway.
///
/// Owns the connection lifecycle: dial, resubscribe, heartbeat, linear
/// reconnect backoff and terminal give-up. Ticks and connection-state
/// changes are delivered through typed buses; registration returns a guard
/// that unregisters on drop.
pub struct MarketFeedClient {
    session: FeedSession,
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    ticks: EventBus<Tick>,
    status: EventBus<ConnectionStatus>,
    stats: Arc<FeedStats>,
    outgoing_tx: mpsc::UnboundedSender<String>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<String>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl MarketFeedClient {
    pub fn new(session: FeedSession) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Self {
            session,
            subscriptions: Arc::new(Mutex::new(SubscriptionSet::default())),
            ticks: EventBus::new(),
            status: EventBus::new(),
            stats: Arc::new(FeedStats::default()),
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
            task: None,
        }
    }

    /// Start the feed loop. Fails fast when the session is incomplete; the
    /// client never tries to authenticate by itself.
    pub fn connect(&mut self) -> Result<(), AdapterError> {
        if !self.session.is_complete() {
            return Err(AdapterError::Auth(
                "missing session credentials for the market feed".to_string(),
            ));
        }

        let outgoing_rx = self
            .outgoing_rx
            .take()
            .ok_or_else(|| AdapterError::InvalidRequest("feed client already started".to_string()))?;

        let worker = FeedWorker {
            url: format!(
                "wss://{FEED_DOMAIN}{FEED_PATH}?clientCode={}&feedToken={}&apiKey={}",
                self.session.client_code, self.session.feed_token, self.session.api_key
            ),
            subscriptions: Arc::clone(&self.subscriptions),
            ticks: self.ticks.clone(),
            status: self.status.clone(),
            stats: Arc::clone(&self.stats),
        };

        self.task = Some(tokio::spawn(worker.run(outgoing_rx)));
        Ok(())
    }

    /// Halt the feed. Aggregated state downstream stays valid and
    /// displayable; only future tick delivery stops.
    pub fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.status.emit(&ConnectionStatus::Disconnected);
        }
    }

    /// Register (or refresh) a subscription. Sent immediately when
    /// connected and replayed automatically after every reconnect.
    pub fn subscribe(&self, mode: SubscriptionMode, instruments: &[Instrument]) {
        let request = self
            .subscriptions
            .lock()
            .expect("subscription set poisoned")
            .subscribe(mode, instruments);

        if let Some(request) = request {
            self.send_control(&request);
        }
    }

    /// Remove a stored subscription; stops future tick delivery for those
    /// instruments without discarding anything already aggregated.
    pub fn unsubscribe(&self, mode: SubscriptionMode, instruments: &[Instrument]) {
        let request = self
            .subscriptions
            .lock()
            .expect("subscription set poisoned")
            .unsubscribe(mode, instruments);

        if let Some(request) = request {
            self.send_control(&request);
        }
    }

    fn send_control(&self, request: &super::SubscribeRequest) {
        match serde_json::to_string(request) {
            Ok(message) => {
                // delivery is best-effort: a disconnected loop replays the
                // stored set on the next connect anyway
                let _ = self.outgoing_tx.send(message);
            }
            Err(e) => log::error!("failed to serialize subscribe request: {e}"),
        }
    }

    pub fn on_tick(&self, listener: impl Fn(&Tick) + Send + Sync + 'static) -> ListenerGuard<Tick> {
        self.ticks.subscribe(listener)
    }

    pub fn on_status(
        &self,
        listener: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> ListenerGuard<ConnectionStatus> {
        self.status.subscribe(listener)
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for MarketFeedClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct FeedWorker {
    url: String,
    subscriptions: Arc<Mutex<SubscriptionSet>>,
    ticks: EventBus<Tick>,
    status: EventBus<ConnectionStatus>,
    stats: Arc<FeedStats>,
}

impl FeedWorker {
    async fn run(self, mut outgoing: mpsc::UnboundedReceiver<String>) {
        let mut state = State::Disconnected;
        let mut policy = ReconnectPolicy::new();
        let mut last_prices: FxHashMap<u32, Price> = FxHashMap::default();
        let mut last_read = Instant::now();
        let mut last_heartbeat = Instant::now();

        self.status.emit(&ConnectionStatus::Connecting);

        loop {
            match &mut state {
                State::Disconnected => match connect_ws(FEED_DOMAIN, &self.url).await {
                    Ok(mut ws) => {
                        if self.replay_subscriptions(&mut ws).await.is_err() {
                            log::warn!("resubscribe failed right after connect");
                            if self.schedule_retry(&mut policy).await {
                                return;
                            }
                            continue;
                        }

                        policy.on_connected();
                        last_read = Instant::now();
                        last_heartbeat = Instant::now();
                        state = State::Connected(ws);
                        self.status.emit(&ConnectionStatus::Connected);
                    }
                    Err(e) => {
                        log::warn!("feed connect failed: {e}");
                        if self.schedule_retry(&mut policy).await {
                            return;
                        }
                    }
                },
                State::Connected(ws) => {
                    while let Ok(message) = outgoing.try_recv() {
                        if send_text(ws, &message).await.is_err() {
                            break;
                        }
                    }

                    if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                        last_heartbeat = Instant::now();
                        if send_text(ws, HEARTBEAT_MESSAGE).await.is_err() {
                            state = State::Disconnected;
                            self.status.emit(&ConnectionStatus::Disconnected);
                            continue;
                        }
                    }

                    match tokio::time::timeout(READ_POLL_INTERVAL, ws.read_frame()).await {
                        Ok(Ok(frame)) => {
                            last_read = Instant::now();
                            match frame.opcode {
                                OpCode::Binary => {
                                    self.handle_binary(&frame.payload[..], &mut last_prices);
                                }
                                OpCode::Text => {
                                    self.handle_text(&frame.payload[..], &mut last_prices);
                                }
                                OpCode::Close => {
                                    state = State::Disconnected;
                                    self.status.emit(&ConnectionStatus::Disconnected);
                                }
                                _ => {}
                            }
                        }
                        Ok(Err(e)) => {
                            log::warn!("feed read error: {e}");
                            state = State::Disconnected;
                            self.status.emit(&ConnectionStatus::Disconnected);
                        }
                        Err(_elapsed) => {
                            if last_read.elapsed() >= connect::WS_READ_TIMEOUT {
                                log::warn!("feed read timeout, connection stale");
                                state = State::Disconnected;
                                self.status.emit(&ConnectionStatus::Disconnected);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Resend every stored subscription so callers never need to know
    /// whether this is the first or the nth connection.
    async fn replay_subscriptions(
        &self,
        ws: &mut fastwebsockets::FragmentCollector<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>,
    ) -> Result<(), AdapterError> {
        let messages: Vec<String> = {
            let subscriptions = self.subscriptions.lock().expect("subscription set poisoned");
            subscriptions
                .replay()
                .filter_map(|request| serde_json::to_string(request).ok())
                .collect()
        };

        for message in messages {
            send_text(ws, &message).await?;
        }
        Ok(())
    }

    /// Returns true when the attempt budget is spent; the terminal state is
    /// reported exactly once, right before the loop exits.
    async fn schedule_retry(&self, policy: &mut ReconnectPolicy) -> bool {
        match policy.on_failure() {
            Reconnect::Retry { attempt, delay } => {
                self.stats
                    .reconnects
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.status.emit(&ConnectionStatus::Reconnecting(attempt));
                tokio::time::sleep(delay).await;
                false
            }
            Reconnect::GiveUp => {
                self.status.emit(&ConnectionStatus::GivenUp);
                true
            }
        }
    }

    fn handle_binary(&self, payload: &[u8], last_prices: &mut FxHashMap<u32, Price>) {
        match decode_tick_frame(payload) {
            Ok(frame) => {
                let tick = frame.into_tick(now_millis(), last_prices);
                self.stats
                    .ticks
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.ticks.emit(&tick);
            }
            Err(e) => {
                self.stats
                    .decode_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                log::warn!("dropped undecodable tick frame: {e}");
            }
        }
    }

    fn handle_text(&self, payload: &[u8], last_prices: &mut FxHashMap<u32, Price>) {
        if payload == HEARTBEAT_MESSAGE.as_bytes() || payload == b"pong" {
            return;
        }

        match decode_tick_json(payload) {
            Ok(frame) => {
                let tick = frame.into_tick(now_millis(), last_prices);
                self.stats
                    .ticks
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.ticks.emit(&tick);
            }
            Err(e) => {
                self.stats
                    .decode_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                log::warn!("dropped undecodable text frame: {e}");
            }
        }
    }
}

async fn send_text(
    ws: &mut fastwebsockets::FragmentCollector<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>,
    payload: &str,
) -> Result<(), AdapterError> {
    ws.write_frame(Frame::text(Payload::Borrowed(payload.as_bytes())))
        .await
        .map_err(|e| AdapterError::Websocket(e.to_string()))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One decoded frame before receive-time stamping and side inference.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TickFrame {
    segment: ExchangeSegment,
    token: u32,
    last_price: Price,
    last_qty: Qty,
    avg_price: Price,
    volume: Qty,
    total_buy_qty: Qty,
    total_sell_qty: Qty,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    open_interest: u32,
}

impl TickFrame {
    /// The wire carries no aggressor flag, so the side comes from the tick
    /// rule: a print below the previous trade of the same token counts as
    /// seller-initiated.
    fn into_tick(self, time: u64, last_prices: &mut FxHashMap<u32, Price>) -> Tick {
        let is_sell = last_prices
            .get(&self.token)
            .is_some_and(|prev| self.last_price < *prev);
        last_prices.insert(self.token, self.last_price);

        Tick {
            time,
            segment: self.segment,
            token: self.token,
            is_sell,
            last_price: self.last_price,
            last_qty: self.last_qty,
            avg_price: self.avg_price,
            volume: self.volume,
            total_buy_qty: self.total_buy_qty,
            total_sell_qty: self.total_sell_qty,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            open_interest: self.open_interest,
        }
    }
}

/// Decode the fixed-offset binary layout. The layout is asserted by the
/// gateway docs rather than proven, so the length is validated up front and
/// trailing bytes beyond the known fields are tolerated.
fn decode_tick_frame(payload: &[u8]) -> Result<TickFrame, AdapterError> {
    if payload.len() < TICK_FRAME_LEN {
        return Err(AdapterError::Parse(format!(
            "tick frame too short: {} bytes, expected {TICK_FRAME_LEN}",
            payload.len()
        )));
    }

    let mut buf = payload;

    let segment_code = buf.get_u8();
    let segment = ExchangeSegment::from_code(segment_code)
        .ok_or_else(|| AdapterError::Parse(format!("unknown exchange code: {segment_code}")))?;

    let token = buf.get_u32_le();
    let last_price = wire_price(buf.get_i32_le());
    let last_qty = Qty::from_units(i64::from(buf.get_u32_le()) * qty_unit());
    let avg_price = wire_price(buf.get_i32_le());
    let volume = Qty::from_units(i64::from(buf.get_u32_le()) * qty_unit());
    let total_buy_qty = Qty::from_units(i64::from(buf.get_u32_le()) * qty_unit());
    let total_sell_qty = Qty::from_units(i64::from(buf.get_u32_le()) * qty_unit());
    let open = wire_price(buf.get_i32_le());
    let high = wire_price(buf.get_i32_le());
    let low = wire_price(buf.get_i32_le());
    let close = wire_price(buf.get_i32_le());
    let open_interest = buf.get_u32_le();

    Ok(TickFrame {
        segment,
        token,
        last_price,
        last_qty,
        avg_price,
        volume,
        total_buy_qty,
        total_sell_qty,
        open,
        high,
        low,
        close,
        open_interest,
    })
}

fn wire_price(scaled: i32) -> Price {
    Price::from_scaled(i64::from(scaled), WIRE_PRICE_SCALE)
}

fn qty_unit() -> i64 {
    10i64.pow(Qty::QTY_SCALE as u32)
}

#[derive(Deserialize, Debug)]
struct DeTick {
    #[serde(rename = "exchangeType")]
    exchange_type: u8,
    token: String,
    ltp: f32,
    ltq: f32,
    #[serde(rename = "avgPrice", default)]
    avg_price: f32,
    #[serde(default)]
    volume: f32,
    #[serde(rename = "totalBuyQty", default)]
    total_buy_qty: f32,
    #[serde(rename = "totalSellQty", default)]
    total_sell_qty: f32,
    #[serde(default)]
    open: f32,
    #[serde(default)]
    high: f32,
    #[serde(default)]
    low: f32,
    #[serde(default)]
    close: f32,
    #[serde(rename = "oi", default)]
    open_interest: u32,
}

/// Structured (already decoded) frames arrive as JSON with unscaled decimal
/// prices.
fn decode_tick_json(payload: &[u8]) -> Result<TickFrame, AdapterError> {
    let de: DeTick =
        sonic_rs::from_slice(payload).map_err(|e| AdapterError::Parse(e.to_string()))?;

    let segment = ExchangeSegment::from_code(de.exchange_type).ok_or_else(|| {
        AdapterError::Parse(format!("unknown exchange code: {}", de.exchange_type))
    })?;
    let token = de
        .token
        .parse::<u32>()
        .map_err(|e| AdapterError::Parse(format!("bad token '{}': {e}", de.token)))?;

    Ok(TickFrame {
        segment,
        token,
        last_price: Price::from_f32(de.ltp),
        last_qty: Qty::from_f32(de.ltq),
        avg_price: Price::from_f32(de.avg_price),
        volume: Qty::from_f32(de.volume),
        total_buy_qty: Qty::from_f32(de.total_buy_qty),
        total_sell_qty: Qty::from_f32(de.total_sell_qty),
        open: Price::from_f32(de.open),
        high: Price::from_f32(de.high),
        low: Price::from_f32(de.low),
        close: Price::from_f32(de.close),
        open_interest: de.open_interest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TICK_FRAME_LEN);
        bytes.push(1u8); // NSE cash
        bytes.extend_from_slice(&3045u32.to_le_bytes()); // token
        bytes.extend_from_slice(&87_435i32.to_le_bytes()); // ltp = 874.35
        bytes.extend_from_slice(&150u32.to_le_bytes()); // ltq
        bytes.extend_from_slice(&87_400i32.to_le_bytes()); // atp = 874.00
        bytes.extend_from_slice(&1_250_000u32.to_le_bytes()); // volume
        bytes.extend_from_slice(&600_000u32.to_le_bytes()); // total buy
        bytes.extend_from_slice(&650_000u32.to_le_bytes()); // total sell
        bytes.extend_from_slice(&87_000i32.to_le_bytes()); // open = 870.00
        bytes.extend_from_slice(&87_900i32.to_le_bytes()); // high = 879.00
        bytes.extend_from_slice(&86_800i32.to_le_bytes()); // low = 868.00
        bytes.extend_from_slice(&87_435i32.to_le_bytes()); // close = 874.35
        bytes.extend_from_slice(&0u32.to_le_bytes()); // oi
        bytes
    }

    #[test]
    fn decodes_a_valid_binary_frame() {
        let frame = decode_tick_frame(&frame_bytes()).expect("valid frame");

        assert_eq!(frame.segment, ExchangeSegment::NseCash);
        assert_eq!(frame.token, 3045);
        assert_eq!(frame.last_price, Price::from_scaled(87_435, 2));
        assert_eq!(frame.last_qty, Qty::from_f32(150.0));
        assert_eq!(frame.open, Price::from_f32(870.0));
        assert_eq!(frame.high, Price::from_f32(879.0));
        assert_eq!(frame.low, Price::from_f32(868.0));
        assert_eq!(frame.close, Price::from_scaled(87_435, 2));
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut bytes = frame_bytes();
        bytes.extend_from_slice(&[0u8; 14]);

        assert!(decode_tick_frame(&bytes).is_ok());
    }

    #[test]
    fn short_frame_is_an_error_not_a_tick() {
        let bytes = frame_bytes();

        let err = decode_tick_frame(&bytes[..TICK_FRAME_LEN - 1]).unwrap_err();
        assert!(matches!(err, AdapterError::Parse(_)));
    }

    #[test]
    fn unknown_exchange_code_is_rejected() {
        let mut bytes = frame_bytes();
        bytes[0] = 99;

        assert!(decode_tick_frame(&bytes).is_err());
    }

    #[test]
    fn tick_rule_infers_trade_side() {
        let mut last_prices = FxHashMap::default();
        let frame = decode_tick_frame(&frame_bytes()).unwrap();

        // first print of a token counts as buyer-initiated
        let first = frame.into_tick(1_000, &mut last_prices);
        assert!(!first.is_sell);

        let mut lower = frame;
        lower.last_price = Price::from_f32(874.30);
        let second = lower.into_tick(1_001, &mut last_prices);
        assert!(second.is_sell);

        // equal price keeps the uptick classification
        let third = lower.into_tick(1_002, &mut last_prices);
        assert!(!third.is_sell);
    }

    #[test]
    fn decodes_a_structured_json_frame() {
        let payload = br#"{
            "exchangeType": 1,
            "token": "3045",
            "ltp": 874.35,
            "ltq": 150,
            "avgPrice": 874.0,
            "volume": 1250000,
            "totalBuyQty": 600000,
            "totalSellQty": 650000,
            "open": 870.0,
            "high": 879.0,
            "low": 868.0,
            "close": 874.35,
            "oi": 0
        }"#;

        let frame = decode_tick_json(payload).expect("valid json frame");
        assert_eq!(frame.token, 3045);
        assert_eq!(frame.last_price, Price::from_f32(874.35));
        assert_eq!(frame.total_sell_qty, Qty::from_f32(650_000.0));
    }

    #[test]
    fn garbage_text_is_a_parse_error() {
        assert!(decode_tick_json(b"{\"event\":\"unknown\"}").is_err());
        assert!(decode_tick_json(b"not json").is_err());
    }

    #[tokio::test]
    async fn connect_fails_fast_without_a_session() {
        let mut client = MarketFeedClient::new(FeedSession::default());

        match client.connect() {
            Err(AdapterError::Auth(_)) => {}
            other => panic!("expected auth failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let mut client = MarketFeedClient::new(FeedSession::new("key", "A123", "token"));

        client.connect().expect("first connect");
        assert!(matches!(
            client.connect(),
            Err(AdapterError::InvalidRequest(_))
        ));
        client.disconnect();
    }

    #[tokio::test]
    async fn subscriptions_are_stored_while_disconnected() {
        let client = MarketFeedClient::new(FeedSession::new("key", "A123", "token"));
        let instrument = Instrument::new(ExchangeSegment::NseCash, 3045, 0.05);

        client.subscribe(SubscriptionMode::Quote, &[instrument]);
        client.subscribe(SubscriptionMode::Quote, &[instrument]);

        let subscriptions = client.subscriptions.lock().unwrap();
        assert_eq!(subscriptions.len(), 1);
    }
}
