//! Presentation core for the order-flow footprint chart: coordinate
//! mapping over the candle series produced by `data`, composited by a
//! fixed-order render pass onto a borrowed surface.

pub mod chart;
pub mod render;
pub mod style;

pub use chart::ChartMapper;
pub use chart::scale::{PriceScaleEngine, TimeScaleEngine};
pub use render::{MemoryFrame, RenderPass, Surface};
pub use style::Palette;
