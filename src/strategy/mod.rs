// Trading strategy module
pub mod trend;

use crate::models::{IndicatorPoint, Signal};

pub use trend::SignalGenerator;

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal for a freshly recorded point
    ///
    /// `yield_threshold_pct` is the current user setting and may differ between calls.
    fn evaluate(&self, point: &IndicatorPoint, yield_threshold_pct: f64) -> Option<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Samples that must be recorded before the first signal is possible
    fn warmup_samples(&self) -> usize;
}
