use crate::chart::footprint::FootprintCandle;

use exchange::{
    Instrument, Tick, Timeframe,
    unit::{PriceStep, Qty},
};
use rustc_hash::FxHashMap;

use std::collections::VecDeque;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Ticks whose bucket was already finished; folded into the open candle
    /// and counted here as recoverable-but-reportable.
    pub late_ticks: u64,
}

/// Candle sequence for one instrument: exactly one open candle plus a
/// bounded history of finished ones (ring semantics, oldest evicted).
pub struct InstrumentSeries {
    interval: Timeframe,
    step: PriceStep,
    max_bars: usize,
    finished: VecDeque<FootprintCandle>,
    open: Option<FootprintCandle>,
    stats: AggregatorStats,
}

impl InstrumentSeries {
    pub fn new(interval: Timeframe, step: PriceStep, max_bars: usize) -> Self {
        Self {
            interval,
            step,
            max_bars: max_bars.max(1),
            finished: VecDeque::new(),
            open: None,
            stats: AggregatorStats::default(),
        }
    }

    pub fn tick_size(&self) -> PriceStep {
        self.step
    }

    pub fn interval(&self) -> Timeframe {
        self.interval
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    fn prev_cum_delta(&self) -> Qty {
        self.finished
            .back()
            .map_or(Qty::ZERO, |candle| candle.cum_delta)
    }

    /// Per-tick work is O(1) amortized; analytics refresh happens on candle
    /// finish and on `refresh_open`, not here.
    pub fn insert_tick(&mut self, tick: &Tick) {
        let interval = self.interval.to_milliseconds();
        let bucket = (tick.time / interval) * interval;

        match &mut self.open {
            None => {
                self.open = Some(FootprintCandle::seed(bucket, tick, self.step));
            }
            Some(candle) if bucket <= candle.start_time => {
                // an older bucket is folded into whichever candle is open
                if bucket < candle.start_time {
                    self.stats.late_ticks += 1;
                    log::debug!(
                        "late tick (bucket {bucket}) folded into open candle {}",
                        candle.start_time
                    );
                }
                candle.apply(tick, self.step);
            }
            Some(_) => {
                let mut closed = self.open.take().expect("open candle checked above");
                closed.refresh_analytics(self.prev_cum_delta());
                closed.is_finished = true;

                self.finished.push_back(closed);
                while self.finished.len() > self.max_bars {
                    self.finished.pop_front();
                }

                self.open = Some(FootprintCandle::seed(bucket, tick, self.step));
            }
        }
    }

    /// Recompute the open candle's derived metrics. Called by the render
    /// loop once per frame rather than per tick.
    pub fn refresh_open(&mut self) {
        let prev = self.prev_cum_delta();
        if let Some(candle) = &mut self.open {
            candle.refresh_analytics(prev);
        }
    }

    /// Oldest to newest, finished history first, then the open candle.
    pub fn candles(&self) -> impl Iterator<Item = &FootprintCandle> {
        self.finished.iter().chain(self.open.iter())
    }

    pub fn finished_len(&self) -> usize {
        self.finished.len()
    }

    pub fn len(&self) -> usize {
        self.finished.len() + usize::from(self.open.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open_candle(&self) -> Option<&FootprintCandle> {
        self.open.as_ref()
    }

    pub fn latest_price(&self) -> Option<exchange::Price> {
        self.candles().last().map(|candle| candle.close)
    }

    /// Min/max trade price over the most recent `lookback` candles, for
    /// fitting the price scale to the data.
    pub fn price_range(&self, lookback: usize) -> Option<(exchange::Price, exchange::Price)> {
        let mut iter = self.finished.iter().chain(self.open.iter()).rev().take(lookback);

        let first = iter.next()?;
        let mut low = first.low;
        let mut high = first.high;

        for candle in iter {
            if candle.low < low {
                low = candle.low;
            }
            if candle.high > high {
                high = candle.high;
            }
        }

        Some((low, high))
    }
}

/// Converts the tick stream into footprint candles, keyed by instrument
/// token; nothing here assumes a single instrument. Only tracked
/// instruments aggregate, so unsubscribing upstream simply stops mutation
/// while the accumulated series stays readable.
pub struct FootprintAggregator {
    interval: Timeframe,
    max_bars: usize,
    series: FxHashMap<u32, InstrumentSeries>,
}

impl FootprintAggregator {
    pub fn new(interval: Timeframe, max_bars: usize) -> Self {
        Self {
            interval,
            max_bars,
            series: FxHashMap::default(),
        }
    }

    /// Register an instrument for aggregation. Idempotent; the instrument's
    /// tick size becomes the cell snapping step.
    pub fn track(&mut self, instrument: Instrument) {
        self.series.entry(instrument.token).or_insert_with(|| {
            InstrumentSeries::new(self.interval, instrument.tick_size, self.max_bars)
        });
    }

    pub fn insert_tick(&mut self, tick: &Tick) {
        if let Some(series) = self.series.get_mut(&tick.token) {
            series.insert_tick(tick);
        }
    }

    pub fn series(&self, token: u32) -> Option<&InstrumentSeries> {
        self.series.get(&token)
    }

    pub fn series_mut(&mut self, token: u32) -> Option<&mut InstrumentSeries> {
        self.series.get_mut(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::{ExchangeSegment, Price};

    const MINUTE: u64 = 60_000;

    fn tick(time: u64, price: f32, qty: f32, is_sell: bool) -> Tick {
        let price = Price::from_f32(price);
        Tick {
            time,
            segment: ExchangeSegment::NseCash,
            token: 3045,
            is_sell,
            last_price: price,
            last_qty: Qty::from_f32(qty),
            avg_price: price,
            volume: Qty::ZERO,
            total_buy_qty: Qty::ZERO,
            total_sell_qty: Qty::ZERO,
            open: price,
            high: price,
            low: price,
            close: price,
            open_interest: 0,
        }
    }

    fn series() -> InstrumentSeries {
        InstrumentSeries::new(Timeframe::M1, PriceStep::from_f32(0.05), 5)
    }

    #[test]
    fn same_bucket_mutates_the_open_candle() {
        let mut series = series();
        series.insert_tick(&tick(1_000, 100.0, 1.0, false));
        series.insert_tick(&tick(30_000, 100.5, 2.0, true));

        assert_eq!(series.len(), 1);
        assert_eq!(series.finished_len(), 0);

        let open = series.open_candle().unwrap();
        assert_eq!(open.start_time, 0);
        assert_eq!(open.volume, Qty::from_f32(3.0));
        assert!(!open.is_finished);
    }

    #[test]
    fn bucket_boundary_finishes_and_reopens() {
        let mut series = series();
        series.insert_tick(&tick(1_000, 100.0, 1.0, false));
        series.insert_tick(&tick(MINUTE + 1, 101.0, 2.0, false));

        assert_eq!(series.finished_len(), 1);
        let closed = series.candles().next().unwrap();
        assert!(closed.is_finished);
        assert_eq!(closed.start_time, 0);

        let open = series.open_candle().unwrap();
        assert_eq!(open.start_time, MINUTE);
        assert_eq!(open.open, Price::from_f32(101.0));
    }

    #[test]
    fn cum_delta_chains_across_candles() {
        let mut series = series();
        // candle 0: +5
        series.insert_tick(&tick(0, 100.0, 5.0, false));
        // candle 1: -2
        series.insert_tick(&tick(MINUTE, 100.0, 2.0, true));
        // candle 2: +1, also finishes candle 1
        series.insert_tick(&tick(2 * MINUTE, 100.0, 1.0, false));
        series.refresh_open();

        let cum: Vec<f32> = series.candles().map(|c| c.cum_delta.to_f32()).collect();
        assert_eq!(cum, vec![5.0, 3.0, 4.0]);

        let deltas: Vec<f32> = series.candles().map(|c| c.delta.to_f32()).collect();
        assert_eq!(deltas, vec![5.0, -2.0, 1.0]);
    }

    #[test]
    fn history_is_bounded_and_keeps_the_most_recent() {
        let mut series = series();
        for i in 0..10u64 {
            series.insert_tick(&tick(i * MINUTE, 100.0 + i as f32, 1.0, false));
        }

        assert_eq!(series.finished_len(), 5);
        assert_eq!(series.len(), 6);

        let starts: Vec<u64> = series.candles().map(|c| c.start_time).collect();
        assert_eq!(
            starts,
            vec![
                4 * MINUTE,
                5 * MINUTE,
                6 * MINUTE,
                7 * MINUTE,
                8 * MINUTE,
                9 * MINUTE
            ]
        );
    }

    #[test]
    fn late_tick_is_folded_and_counted() {
        let mut series = series();
        series.insert_tick(&tick(1_000, 100.0, 1.0, false));
        series.insert_tick(&tick(MINUTE + 1, 101.0, 1.0, false));

        // timestamp behind the already-finished candle
        series.insert_tick(&tick(30_000, 99.0, 2.0, true));

        assert_eq!(series.stats().late_ticks, 1);
        let open = series.open_candle().unwrap();
        assert_eq!(open.start_time, MINUTE);
        assert_eq!(open.volume, Qty::from_f32(3.0));
        // the late print stretched the open candle's range
        assert_eq!(open.low, Price::from_f32(99.0));
    }

    #[test]
    fn untracked_tokens_are_ignored() {
        let mut aggregator = FootprintAggregator::new(Timeframe::M1, 100);
        aggregator.track(Instrument::new(ExchangeSegment::NseCash, 3045, 0.05));

        aggregator.insert_tick(&tick(0, 100.0, 1.0, false));
        let mut foreign = tick(0, 50.0, 1.0, false);
        foreign.token = 999;
        aggregator.insert_tick(&foreign);

        assert_eq!(aggregator.series(3045).unwrap().len(), 1);
        assert!(aggregator.series(999).is_none());
    }

    #[test]
    fn price_range_spans_recent_candles() {
        let mut series = series();
        series.insert_tick(&tick(0, 100.0, 1.0, false));
        series.insert_tick(&tick(10_000, 104.0, 1.0, false));
        series.insert_tick(&tick(MINUTE, 98.0, 1.0, true));

        let (low, high) = series.price_range(10).unwrap();
        assert_eq!(low, Price::from_f32(98.0));
        assert_eq!(high, Price::from_f32(104.0));
    }
}
