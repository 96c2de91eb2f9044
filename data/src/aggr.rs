pub mod time;

pub use time::{AggregatorStats, FootprintAggregator, InstrumentSeries};
