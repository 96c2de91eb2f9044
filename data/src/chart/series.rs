use crate::chart::footprint::FootprintCandle;

/// Time values in the generic series are second-granularity timestamps;
/// truncation, not rounding, per the chart widget contract.
fn to_chart_time(time_ms: u64) -> i64 {
    (time_ms / 1000) as i64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcPoint {
    pub time: i64,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPoint {
    pub time: i64,
    pub value: f32,
    pub color: String,
}

/// Color pairs handed to external chart widgets, as hex strings. Cumulative
/// delta uses a different pairing than plain delta so the two histograms
/// read apart at a glance.
#[derive(Debug, Clone)]
pub struct SeriesColors {
    pub bullish: String,
    pub bearish: String,
    pub delta_positive: String,
    pub delta_negative: String,
    pub cum_delta_positive: String,
    pub cum_delta_negative: String,
}

impl Default for SeriesColors {
    fn default() -> Self {
        Self {
            bullish: "#26a69a".to_string(),
            bearish: "#ef5350".to_string(),
            delta_positive: "#089981".to_string(),
            delta_negative: "#f23645".to_string(),
            cum_delta_positive: "#2962ff".to_string(),
            cum_delta_negative: "#e91e63".to_string(),
        }
    }
}

pub fn ohlc_point(candle: &FootprintCandle) -> OhlcPoint {
    OhlcPoint {
        time: to_chart_time(candle.start_time),
        open: candle.open.to_f32(),
        high: candle.high.to_f32(),
        low: candle.low.to_f32(),
        close: candle.close.to_f32(),
    }
}

pub fn volume_point(candle: &FootprintCandle, colors: &SeriesColors) -> HistogramPoint {
    let color = if candle.bullish() {
        &colors.bullish
    } else {
        &colors.bearish
    };

    HistogramPoint {
        time: to_chart_time(candle.start_time),
        value: candle.volume.to_f32(),
        color: color.clone(),
    }
}

/// Delta sign picks the color, independent of candle direction.
pub fn delta_point(candle: &FootprintCandle, colors: &SeriesColors) -> HistogramPoint {
    let value = candle.delta.to_f32();
    let color = if value >= 0.0 {
        &colors.delta_positive
    } else {
        &colors.delta_negative
    };

    HistogramPoint {
        time: to_chart_time(candle.start_time),
        value,
        color: color.clone(),
    }
}

pub fn cumulative_delta_point(candle: &FootprintCandle, colors: &SeriesColors) -> HistogramPoint {
    let value = candle.cum_delta.to_f32();
    let color = if value >= 0.0 {
        &colors.cum_delta_positive
    } else {
        &colors.cum_delta_negative
    };

    HistogramPoint {
        time: to_chart_time(candle.start_time),
        value,
        color: color.clone(),
    }
}

pub fn ohlc_series<'a>(candles: impl IntoIterator<Item = &'a FootprintCandle>) -> Vec<OhlcPoint> {
    candles.into_iter().map(ohlc_point).collect()
}

pub fn volume_series<'a>(
    candles: impl IntoIterator<Item = &'a FootprintCandle>,
    colors: &SeriesColors,
) -> Vec<HistogramPoint> {
    candles
        .into_iter()
        .map(|candle| volume_point(candle, colors))
        .collect()
}

pub fn delta_series<'a>(
    candles: impl IntoIterator<Item = &'a FootprintCandle>,
    colors: &SeriesColors,
) -> Vec<HistogramPoint> {
    candles
        .into_iter()
        .map(|candle| delta_point(candle, colors))
        .collect()
}

pub fn cumulative_delta_series<'a>(
    candles: impl IntoIterator<Item = &'a FootprintCandle>,
    colors: &SeriesColors,
) -> Vec<HistogramPoint> {
    candles
        .into_iter()
        .map(|candle| cumulative_delta_point(candle, colors))
        .collect()
}
