use super::{RenderPass, Surface, Text, TextAnchor};
use crate::chart::scale::{LABEL_TARGET, price_grid_lines};

use data::aggr::InstrumentSeries;
use data::chart::footprint::FootprintCell;
use data::config::DisplayMode;
use data::util::{abbr_large_numbers, abbr_signed};

use iced_core::Point;

const TEXT_SIZE: f32 = 11.0;

/// Cells projected thinner than this render without labels; anything
/// smaller is unreadable clutter.
const MIN_CELL_LABEL_HEIGHT: f32 = 10.0;

/// Immediate-mode text layer: price grid and axis labels, per-cell volume
/// labels and per-candle summaries. Draws over the shape layer; z-order is
/// submission order, nothing here needs occlusion.
pub(crate) fn draw(frame: &mut impl Surface, pass: &RenderPass, series: &InstrumentSeries) {
    draw_price_grid(frame, pass);

    let cell_height = pass.cell_height_px(series);
    let show_cell_labels = cell_height >= MIN_CELL_LABEL_HEIGHT;
    let cell_text_size = TEXT_SIZE.min(cell_height - 2.0);
    let total = series.len();

    for (position, candle) in series.candles().enumerate() {
        let index = (total - 1 - position) as f32;
        let x = pass.mapper.time.index_to_x(index);
        if !pass.is_column_visible(x) {
            continue;
        }

        let y_high = pass.mapper.price.price_to_y(candle.high.to_f32());
        if !(x.is_finite() && y_high.is_finite()) {
            continue;
        }

        if show_cell_labels {
            for cell in candle.cells.values() {
                if f32::from(cell.total()) < pass.settings.volume_threshold {
                    continue;
                }

                let y = pass.mapper.price.price_to_y(cell.price.to_f32());
                if !y.is_finite() {
                    continue;
                }

                frame.fill_text(Text {
                    content: cell_label(cell, pass.settings.display_mode),
                    position: Point::new(x, y),
                    size: cell_text_size,
                    color: pass.palette.label,
                    anchor: TextAnchor::Center,
                });
            }
        }

        // volume and delta summary stacked above the candle
        frame.fill_text(Text {
            content: abbr_large_numbers(candle.volume.to_f32()),
            position: Point::new(x, y_high - 2.0 * (TEXT_SIZE + 2.0)),
            size: TEXT_SIZE,
            color: pass.palette.label,
            anchor: TextAnchor::BottomCenter,
        });

        let delta = candle.delta.to_f32();
        frame.fill_text(Text {
            content: abbr_signed(delta),
            position: Point::new(x, y_high - (TEXT_SIZE + 2.0)),
            size: TEXT_SIZE,
            color: if delta >= 0.0 {
                pass.palette.bullish
            } else {
                pass.palette.bearish
            },
            anchor: TextAnchor::BottomCenter,
        });

        if pass.settings.show_cumulative_delta {
            let cum_delta = candle.cum_delta.to_f32();
            frame.fill_text(Text {
                content: abbr_signed(cum_delta),
                position: Point::new(x, pass.mapper.price.height() - TEXT_SIZE),
                size: TEXT_SIZE,
                color: if cum_delta >= 0.0 {
                    pass.palette.bullish
                } else {
                    pass.palette.bearish
                },
                anchor: TextAnchor::Center,
            });
        }
    }
}

fn cell_label(cell: &FootprintCell, mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Split => format!(
            "{} x {}",
            abbr_large_numbers(cell.bid_qty.to_f32()),
            abbr_large_numbers(cell.ask_qty.to_f32())
        ),
        DisplayMode::Delta => abbr_signed(cell.delta().to_f32()),
        DisplayMode::ImbalancePercent => {
            let bid = cell.bid_qty.to_f32();
            let ask = cell.ask_qty.to_f32();
            format!("{:.0}%", ask / (bid + ask).max(f32::EPSILON) * 100.0)
        }
    }
}

fn draw_price_grid(frame: &mut impl Surface, pass: &RenderPass) {
    let (lowest, highest) = pass.mapper.price.visible_range();
    let width = pass.mapper.time.width();

    for value in price_grid_lines(highest, lowest, LABEL_TARGET) {
        let y = pass.mapper.price.price_to_y(value);
        if !y.is_finite() {
            continue;
        }

        frame.stroke_line(
            Point::new(0.0, y),
            Point::new(width, y),
            1.0,
            pass.palette.grid,
        );

        frame.fill_text(Text {
            content: format!("{value:.2}"),
            position: Point::new(width - 4.0, y),
            size: TEXT_SIZE,
            color: pass.palette.label,
            anchor: TextAnchor::CenterRight,
        });
    }
}
