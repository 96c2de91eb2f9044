use exchange::{
    Tick,
    unit::{Price, PriceStep, Qty},
};

use std::collections::BTreeMap;

/// One side must dominate the other by this factor for a cell to count as
/// imbalanced. Policy constant, not derived.
pub const IMBALANCE_FACTOR: f32 = 3.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImbalanceFlags {
    pub bid: bool,
    pub ask: bool,
}

impl ImbalanceFlags {
    pub fn any(self) -> bool {
        self.bid || self.ask
    }
}

/// One price level inside a candle. Volume lands on the bid side when the
/// trade was seller-initiated, otherwise on the ask side; `total` is always
/// the sum of both by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootprintCell {
    pub price: Price,
    pub bid_qty: Qty,
    pub ask_qty: Qty,
    pub is_poc: bool,
    pub imbalance: ImbalanceFlags,
}

impl FootprintCell {
    fn new(price: Price) -> Self {
        Self {
            price,
            bid_qty: Qty::ZERO,
            ask_qty: Qty::ZERO,
            is_poc: false,
            imbalance: ImbalanceFlags::default(),
        }
    }

    fn add(&mut self, is_sell: bool, qty: Qty) {
        if is_sell {
            self.bid_qty += qty;
        } else {
            self.ask_qty += qty;
        }
    }

    pub fn total(&self) -> Qty {
        self.bid_qty + self.ask_qty
    }

    pub fn delta(&self) -> Qty {
        self.ask_qty - self.bid_qty
    }

    /// Ratio of the dominant side over the other, for imbalance% labels.
    pub fn imbalance_ratio(&self) -> f32 {
        let bid = f32::from(self.bid_qty);
        let ask = f32::from(self.ask_qty);
        ask.max(bid) / Qty::scale_or_one(ask.min(bid))
    }
}

fn imbalance_flags(cell: &FootprintCell) -> ImbalanceFlags {
    let bid = f32::from(cell.bid_qty);
    let ask = f32::from(cell.ask_qty);

    // a one-sided cell is thin prints, not an imbalance
    if bid <= 0.0 || ask <= 0.0 {
        return ImbalanceFlags::default();
    }

    ImbalanceFlags {
        ask: ask / bid.max(1.0) >= IMBALANCE_FACTOR,
        bid: bid / ask.max(1.0) >= IMBALANCE_FACTOR,
    }
}

/// One time bucket: OHLC derived from the ticks seen, plus the per-price
/// footprint. Owned by the aggregator while open, immutable once finished.
#[derive(Debug, Clone)]
pub struct FootprintCandle {
    pub start_time: u64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Qty,
    pub delta: Qty,
    /// Running total carried from the previous finished candle; fixed when
    /// the candle finishes, reset only on stream restart.
    pub cum_delta: Qty,
    pub poc_price: Option<Price>,
    pub cells: BTreeMap<Price, FootprintCell>,
    pub is_finished: bool,
}

impl FootprintCandle {
    pub fn seed(start_time: u64, tick: &Tick, step: PriceStep) -> Self {
        let mut candle = Self {
            start_time,
            open: tick.last_price,
            high: tick.last_price,
            low: tick.last_price,
            close: tick.last_price,
            volume: Qty::ZERO,
            delta: Qty::ZERO,
            cum_delta: Qty::ZERO,
            poc_price: None,
            cells: BTreeMap::new(),
            is_finished: false,
        };
        candle.apply(tick, step);
        candle
    }

    /// Fold one tick in: OHLC update plus the snapped cell. O(1) amortized,
    /// safe on the network callback's critical path.
    pub fn apply(&mut self, tick: &Tick, step: PriceStep) {
        if tick.last_price > self.high {
            self.high = tick.last_price;
        }
        if tick.last_price < self.low {
            self.low = tick.last_price;
        }
        self.close = tick.last_price;

        let price = tick.last_price.round_to_step(step);
        self.cells
            .entry(price)
            .or_insert_with(|| FootprintCell::new(price))
            .add(tick.is_sell, tick.last_qty);

        self.volume += tick.last_qty;
        if tick.is_sell {
            self.delta = self.delta - tick.last_qty;
        } else {
            self.delta += tick.last_qty;
        }
    }

    pub fn bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn max_cell_qty(&self) -> Qty {
        self.cells
            .values()
            .map(FootprintCell::total)
            .fold(Qty::ZERO, Qty::max)
    }

    /// Recompute the derived per-cell and per-candle metrics. Read-heavy,
    /// not write-heavy: callers may throttle this to frame rate instead of
    /// running it on every tick.
    pub fn refresh_analytics(&mut self, prev_cum_delta: Qty) {
        let mut delta = Qty::ZERO;
        let mut poc_price: Option<Price> = None;
        let mut poc_qty = Qty::ZERO;

        // ascending price order: `>=` lets the higher price win volume ties
        for (price, cell) in &self.cells {
            delta += cell.delta();
            let total = cell.total();
            if total >= poc_qty && !total.is_zero() {
                poc_qty = total;
                poc_price = Some(*price);
            }
        }

        for cell in self.cells.values_mut() {
            cell.imbalance = imbalance_flags(cell);
            cell.is_poc = Some(cell.price) == poc_price;
        }

        self.delta = delta;
        self.poc_price = poc_price;
        self.cum_delta = prev_cum_delta + delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange::ExchangeSegment;

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

    fn step() -> PriceStep {
        PriceStep::from_f32(0.05)
    }

    #[test]
    fn cell_total_is_bid_plus_ask() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.0, 5.0, false), step());
        candle.apply(&tick(11, 100.0, 3.0, true), step());
        candle.apply(&tick(12, 100.0, 2.0, false), step());

        let cell = candle.cells.values().next().unwrap();
        assert_eq!(cell.ask_qty, Qty::from_f32(7.0));
        assert_eq!(cell.bid_qty, Qty::from_f32(3.0));
        assert_eq!(cell.total(), cell.bid_qty + cell.ask_qty);
        assert_eq!(cell.delta(), Qty::from_f32(4.0));
    }

    #[test]
    fn candle_volume_is_sum_of_cell_totals() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.00, 5.0, false), step());
        candle.apply(&tick(11, 100.05, 3.0, true), step());
        candle.apply(&tick(12, 100.10, 2.0, false), step());
        candle.apply(&tick(13, 100.05, 1.0, true), step());

        let cell_sum = candle
            .cells
            .values()
            .map(FootprintCell::total)
            .fold(Qty::ZERO, |acc, q| acc + q);

        assert_eq!(candle.volume, cell_sum);
        assert_eq!(candle.volume, Qty::from_f32(11.0));
    }

    #[test]
    fn sub_tick_prices_share_a_cell() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.02, 1.0, false), step());
        candle.apply(&tick(11, 99.98, 1.0, true), step());

        assert_eq!(candle.cells.len(), 1);
        assert_eq!(
            *candle.cells.keys().next().unwrap(),
            Price::from_f32(100.00)
        );
    }

    #[test]
    fn ohlc_follows_ticks_not_cells() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.0, 1.0, false), step());
        candle.apply(&tick(11, 101.5, 1.0, false), step());
        candle.apply(&tick(12, 99.5, 1.0, true), step());
        candle.apply(&tick(13, 100.5, 1.0, false), step());

        assert_eq!(candle.open, Price::from_f32(100.0));
        assert_eq!(candle.high, Price::from_f32(101.5));
        assert_eq!(candle.low, Price::from_f32(99.5));
        assert_eq!(candle.close, Price::from_f32(100.5));
        assert!(candle.bullish());
    }

    #[test]
    fn poc_ties_break_to_the_higher_price() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.00, 5.0, false), step());
        candle.apply(&tick(11, 100.10, 5.0, false), step());
        candle.apply(&tick(12, 100.05, 4.0, true), step());

        candle.refresh_analytics(Qty::ZERO);

        assert_eq!(
            candle.poc_price,
            Some(Price::from_f32(100.10).round_to_step(step()))
        );
        let poc_flags: Vec<bool> = candle.cells.values().map(|c| c.is_poc).collect();
        assert_eq!(poc_flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn imbalance_needs_both_sides_and_the_factor() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.00, 9.0, false), step());
        candle.apply(&tick(11, 100.00, 3.0, true), step());
        // one-sided level: ask volume only
        candle.apply(&tick(12, 100.05, 50.0, false), step());
        // below the factor: 2x
        candle.apply(&tick(13, 100.10, 6.0, false), step());
        candle.apply(&tick(14, 100.10, 3.0, true), step());

        candle.refresh_analytics(Qty::ZERO);

        let at = |p: f32| candle.cells[&Price::from_f32(p).round_to_step(step())].imbalance;
        assert!(at(100.00).ask); // 9 / 3 == 3x
        assert!(!at(100.00).bid);
        assert!(!at(100.05).any()); // zero bid side never flags
        assert!(!at(100.10).any()); // 2x is under the factor
    }

    #[test]
    fn refresh_keeps_delta_in_sync_with_cells() {
        let mut candle = FootprintCandle::seed(0, &tick(10, 100.00, 5.0, false), step());
        candle.apply(&tick(11, 100.05, 8.0, true), step());

        candle.refresh_analytics(Qty::from_f32(10.0));

        assert_eq!(candle.delta, Qty::from_f32(-3.0));
        assert_eq!(candle.cum_delta, Qty::from_f32(7.0));
    }
}
