// Portfolio valuation module
pub mod worth;

pub use worth::{PercentChange, Worth, WorthTracker};
