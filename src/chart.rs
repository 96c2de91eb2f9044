pub mod scale;

use scale::{PriceScaleEngine, TimeScaleEngine};

use iced_core::Point;

/// Thin façade composing the two scale engines into a single
/// (bar index, price) <-> (x, y) transform. Holds references, not copies:
/// pan/zoom applied to either engine is visible on the next call.
#[derive(Clone, Copy)]
pub struct ChartMapper<'a> {
    pub time: &'a TimeScaleEngine,
    pub price: &'a PriceScaleEngine,
}

impl<'a> ChartMapper<'a> {
    pub fn new(time: &'a TimeScaleEngine, price: &'a PriceScaleEngine) -> Self {
        Self { time, price }
    }

    pub fn to_pixel(&self, index: f32, price: f32) -> Point {
        Point::new(self.time.index_to_x(index), self.price.price_to_y(price))
    }

    /// Inverse of `to_pixel`; no cross-axis coupling.
    pub fn to_data(&self, x: f32, y: f32) -> (f32, f32) {
        (self.time.x_to_index(x), self.price.y_to_price(y))
    }
}
