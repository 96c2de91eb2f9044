use super::{RenderPass, Surface};

use data::aggr::InstrumentSeries;
use data::chart::footprint::FootprintCandle;

use iced_core::{Point, Size};

const IMBALANCE_BOX_ALPHA: f32 = 0.25;

/// Retained-shape layer: candle spines, open/close body markers, imbalance
/// highlight boxes and the point-of-control outline. Every retained shape
/// is redrawn each frame; candle counts are bounded by `max_bars`, so no
/// incremental diffing is worth the bookkeeping.
pub(crate) fn draw(frame: &mut impl Surface, pass: &RenderPass, series: &InstrumentSeries) {
    let spacing = pass.mapper.time.bar_spacing();
    let candle_width = (spacing * 0.2).max(1.0);
    let cell_height = pass.cell_height_px(series);
    let total = series.len();

    for (position, candle) in series.candles().enumerate() {
        let index = (total - 1 - position) as f32;
        let x = pass.mapper.time.index_to_x(index);
        if !pass.is_column_visible(x) {
            continue;
        }

        let y_high = pass.mapper.price.price_to_y(candle.high.to_f32());
        let y_low = pass.mapper.price.price_to_y(candle.low.to_f32());
        let y_open = pass.mapper.price.price_to_y(candle.open.to_f32());
        let y_close = pass.mapper.price.price_to_y(candle.close.to_f32());

        // a malformed candle skips, the frame goes on
        if !(x.is_finite()
            && y_high.is_finite()
            && y_low.is_finite()
            && y_open.is_finite()
            && y_close.is_finite())
        {
            continue;
        }

        draw_imbalance_boxes(frame, pass, candle, x, spacing, cell_height);

        frame.stroke_line(
            Point::new(x, y_high),
            Point::new(x, y_low),
            1.0,
            pass.palette.spine,
        );

        let body_color = if candle.bullish() {
            pass.palette.bullish
        } else {
            pass.palette.bearish
        };
        frame.fill_rectangle(
            Point::new(x - candle_width / 2.0, y_open.min(y_close)),
            Size::new(candle_width, (y_open - y_close).abs().max(1.0)),
            body_color,
        );

        if pass.settings.show_poc {
            draw_poc_outline(frame, pass, candle, x, spacing, cell_height);
        }
    }
}

fn draw_imbalance_boxes(
    frame: &mut impl Surface,
    pass: &RenderPass,
    candle: &FootprintCandle,
    x: f32,
    spacing: f32,
    cell_height: f32,
) {
    for cell in candle.cells.values() {
        if !cell.imbalance.any() {
            continue;
        }

        let y_center = pass.mapper.price.price_to_y(cell.price.to_f32());
        if !y_center.is_finite() {
            continue;
        }

        let color = if cell.imbalance.ask {
            pass.palette.imbalance_ask
        } else {
            pass.palette.imbalance_bid
        };

        frame.fill_rectangle(
            Point::new(x - spacing * 0.45, y_center - cell_height / 2.0),
            Size::new(spacing * 0.9, cell_height.max(1.0)),
            color.scale_alpha(IMBALANCE_BOX_ALPHA),
        );
    }
}

fn draw_poc_outline(
    frame: &mut impl Surface,
    pass: &RenderPass,
    candle: &FootprintCandle,
    x: f32,
    spacing: f32,
    cell_height: f32,
) {
    let Some(poc_price) = candle.poc_price else {
        return;
    };

    let y_center = pass.mapper.price.price_to_y(poc_price.to_f32());
    if !y_center.is_finite() {
        return;
    }

    frame.stroke_rectangle(
        Point::new(x - spacing * 0.45, y_center - cell_height / 2.0),
        Size::new(spacing * 0.9, cell_height.max(1.0)),
        1.0,
        pass.palette.poc,
    );
}
