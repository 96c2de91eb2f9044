pub mod price;
pub mod qty;

pub use price::{Price, PriceStep};
pub use qty::Qty;
