// Technical indicators module
// Moving averages backing the trend-crossover signal

pub mod moving_average;

pub use moving_average::{calculate_sma, next_ema, smoothing_factor};
