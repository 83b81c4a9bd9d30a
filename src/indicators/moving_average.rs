/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// EMA smoothing factor for a window: 2 / (window + 1)
pub fn smoothing_factor(window: usize) -> f64 {
    2.0 / (window as f64 + 1.0)
}

/// One step of the Exponential Moving Average (EMA) recurrence
pub fn next_ema(price: f64, previous_ema: f64, multiplier: f64) -> f64 {
    (price - previous_ema) * multiplier + previous_ema
}
