pub mod aggr;
pub mod chart;
pub mod config;
pub mod util;

pub use config::{ColorScheme, DisplayMode, FootprintSettings};
