use crate::error::ConfigError;
use crate::indicators::{calculate_sma, next_ema, smoothing_factor};
use crate::models::{IndicatorPoint, PriceSample};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 10;

/// Ordered history of price samples and their derived moving averages
///
/// Owned by a single ingest path. Indicators are computed incrementally from the
/// previous point, so the same input sequence always yields the same points.
#[derive(Debug, Clone)]
pub struct PriceSampleBuffer {
    points: VecDeque<IndicatorPoint>,
    window: usize,
    multiplier: f64,
    max_samples: Option<usize>,
}

impl PriceSampleBuffer {
    /// Create an unbounded buffer
    ///
    /// # Arguments
    /// * `window` - Number of prior samples averaged for the SMA
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::InvalidWindow(window));
        }

        Ok(Self {
            points: VecDeque::new(),
            window,
            multiplier: smoothing_factor(window),
            max_samples: None,
        })
    }

    /// Create a buffer that evicts the oldest points beyond `max_samples`
    pub fn with_capacity(window: usize, max_samples: usize) -> Result<Self, ConfigError> {
        if max_samples <= window {
            return Err(ConfigError::InvalidHistoryCap {
                cap: max_samples,
                window,
            });
        }

        let mut buffer = Self::new(window)?;
        buffer.max_samples = Some(max_samples);
        Ok(buffer)
    }

    /// Record a sample and return it with its indicators
    ///
    /// SMA is the mean of the `window` samples before this one, so it first exists
    /// once the buffer holds more than `window` samples. EMA seeds from that SMA and
    /// recurses afterwards. Trend needs two consecutive EMAs.
    pub fn update(&mut self, sample: PriceSample) -> IndicatorPoint {
        let sma = if self.points.len() >= self.window {
            let prior: Vec<f64> = self
                .points
                .iter()
                .rev()
                .take(self.window)
                .map(|p| p.sample.price)
                .collect();
            calculate_sma(&prior, self.window)
        } else {
            None
        };

        let previous_ema = self.points.back().and_then(|p| p.ema);

        let ema = match (previous_ema, sma) {
            (Some(prev), _) => Some(next_ema(sample.price, prev, self.multiplier)),
            (None, Some(seed)) => Some(seed),
            (None, None) => None,
        };

        let trend = match (ema, previous_ema) {
            (Some(current), Some(prev)) if prev != 0.0 => {
                Some(current / prev).filter(|ratio| ratio.is_finite())
            }
            _ => None,
        };

        let point = IndicatorPoint {
            sample,
            sma,
            ema,
            trend,
        };

        self.points.push_back(point);

        if let Some(max) = self.max_samples {
            while self.points.len() > max {
                self.points.pop_front();
            }
        }

        point
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.multiplier
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recently recorded point
    pub fn latest(&self) -> Option<&IndicatorPoint> {
        self.points.back()
    }

    /// All retained points, oldest first
    pub fn points(&self) -> impl Iterator<Item = &IndicatorPoint> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(price: f64, ts: i64) -> PriceSample {
        PriceSample::new(price, 0.1, ts)
    }

    fn feed(buffer: &mut PriceSampleBuffer, prices: &[f64]) -> Vec<IndicatorPoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| buffer.update(sample(p, i as i64 * 400)))
            .collect()
    }

    #[test]
    fn test_new_buffer() {
        let buffer = PriceSampleBuffer::new(10).unwrap();
        assert_eq!(buffer.window(), 10);
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
        assert!((buffer.smoothing_factor() - 2.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            PriceSampleBuffer::new(0),
            Err(ConfigError::InvalidWindow(0))
        ));
    }

    #[test]
    fn test_history_cap_must_exceed_window() {
        assert!(PriceSampleBuffer::with_capacity(10, 10).is_err());
        assert!(PriceSampleBuffer::with_capacity(10, 11).is_ok());
    }

    #[test]
    fn test_warmup_points_are_undefined() {
        let mut buffer = PriceSampleBuffer::new(10).unwrap();
        let points = feed(&mut buffer, &[100.0; 10]);

        assert_eq!(points.len(), 10);
        for point in points {
            assert!(point.sma.is_none());
            assert!(point.ema.is_none());
            assert!(point.trend.is_none());
        }
    }

    #[test]
    fn test_seed_then_recurrence() {
        let mut buffer = PriceSampleBuffer::new(10).unwrap();
        feed(&mut buffer, &[100.0; 10]);

        // 11th sample: SMA over the ten prior samples, EMA seeds from it
        let seed = buffer.update(sample(101.0, 11));
        assert_eq!(seed.sma, Some(100.0));
        assert_eq!(seed.ema, Some(100.0));
        assert!(seed.trend.is_none());

        let next = buffer.update(sample(110.0, 12));
        let k = 2.0 / 11.0;
        let expected_ema = (110.0 - 100.0) * k + 100.0;
        assert!((next.sma.unwrap() - 100.1).abs() < 1e-9);
        assert!((next.ema.unwrap() - expected_ema).abs() < 1e-9);
        assert!((next.trend.unwrap() - expected_ema / 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_identical_input_yields_identical_points() {
        let prices: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0)
            .collect();

        let mut a = PriceSampleBuffer::new(10).unwrap();
        let mut b = PriceSampleBuffer::new(10).unwrap();

        assert_eq!(feed(&mut a, &prices), feed(&mut b, &prices));
    }

    #[test]
    fn test_zero_previous_ema_has_no_trend() {
        let mut buffer = PriceSampleBuffer::new(2).unwrap();
        let points = feed(&mut buffer, &[0.0, 0.0, 0.0, 5.0]);

        assert_eq!(points[2].ema, Some(0.0));
        assert!(points[3].ema.unwrap() > 0.0);
        assert!(points[3].trend.is_none());
    }

    #[test]
    fn test_max_samples_limit() {
        let mut buffer = PriceSampleBuffer::with_capacity(3, 5).unwrap();
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        feed(&mut buffer, &prices);

        assert_eq!(buffer.len(), 5);
        let retained: Vec<f64> = buffer.points().map(|p| p.price()).collect();
        assert_eq!(retained, vec![105.0, 106.0, 107.0, 108.0, 109.0]);

        // Indicators keep flowing after eviction
        let latest = buffer.latest().unwrap();
        assert_eq!(latest.sma, Some(107.0));
        assert!(latest.trend.is_some());
    }
}
