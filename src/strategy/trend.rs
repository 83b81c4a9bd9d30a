use super::Strategy;
use crate::models::{IndicatorPoint, OrderSide, Signal};

pub const DEFAULT_YIELD_THRESHOLD_PCT: f64 = 0.001;

/// EMA trend-crossover signal
///
/// Buys when the EMA grew by more than the yield threshold (in percent) since the
/// previous tick and sells when it shrank by more than it. Anything in between is
/// the dead zone.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    window: usize,
}

impl SignalGenerator {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Strategy for SignalGenerator {
    fn evaluate(&self, point: &IndicatorPoint, yield_threshold_pct: f64) -> Option<Signal> {
        let trend = point.trend?;
        let trend_pct = trend * 100.0;

        let direction = if trend_pct > 100.0 + yield_threshold_pct {
            OrderSide::Buy
        } else if trend_pct < 100.0 - yield_threshold_pct {
            OrderSide::Sell
        } else {
            return None;
        };

        tracing::debug!(
            strategy = self.name(),
            %direction,
            trend,
            price = point.price(),
            "Trend crossed yield threshold"
        );

        Some(Signal {
            direction,
            reference_price: point.price(),
        })
    }

    fn name(&self) -> &str {
        "ema-trend"
    }

    fn warmup_samples(&self) -> usize {
        // SMA needs `window` prior samples, the seed tick has no trend yet
        self.window + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PriceSampleBuffer;
    use crate::models::PriceSample;

    fn point_with_trend(price: f64, trend: Option<f64>) -> IndicatorPoint {
        IndicatorPoint {
            sample: PriceSample::new(price, 0.0, 0),
            sma: Some(price),
            ema: Some(price),
            trend,
        }
    }

    #[test]
    fn test_no_signal_without_trend() {
        let generator = SignalGenerator::new(10);
        assert!(generator.evaluate(&point_with_trend(100.0, None), 0.0).is_none());
    }

    #[test]
    fn test_buy_above_threshold() {
        let generator = SignalGenerator::new(10);
        let signal = generator
            .evaluate(&point_with_trend(110.0, Some(1.002)), 0.1)
            .unwrap();

        assert_eq!(signal.direction, OrderSide::Buy);
        assert_eq!(signal.reference_price, 110.0);
    }

    #[test]
    fn test_sell_below_threshold() {
        let generator = SignalGenerator::new(10);
        let signal = generator
            .evaluate(&point_with_trend(95.0, Some(0.998)), 0.1)
            .unwrap();

        assert_eq!(signal.direction, OrderSide::Sell);
        assert_eq!(signal.reference_price, 95.0);
    }

    #[test]
    fn test_dead_zone() {
        let generator = SignalGenerator::new(10);
        assert!(generator.evaluate(&point_with_trend(100.0, Some(1.0005)), 0.1).is_none());
        assert!(generator.evaluate(&point_with_trend(100.0, Some(0.9995)), 0.1).is_none());
        assert!(generator.evaluate(&point_with_trend(100.0, Some(1.0)), 0.0).is_none());
    }

    #[test]
    fn test_threshold_change_between_evaluations() {
        let generator = SignalGenerator::new(10);
        let point = point_with_trend(100.0, Some(1.003));

        assert!(generator.evaluate(&point, 0.1).is_some());
        assert!(generator.evaluate(&point, 0.5).is_none());
    }

    #[test]
    fn test_short_sequences_never_signal() {
        let generator = SignalGenerator::new(10);

        for len in 0..=11 {
            let mut buffer = PriceSampleBuffer::new(10).unwrap();
            for i in 0..len {
                // Wild swings so any computable trend would breach the threshold
                let price = if i % 2 == 0 { 50.0 } else { 500.0 };
                let point = buffer.update(PriceSample::new(price, 0.0, i as i64));
                assert!(generator.evaluate(&point, 0.0).is_none());
            }
        }
    }

    #[test]
    fn test_buy_after_seed_scenario() {
        let generator = SignalGenerator::new(10);
        let mut buffer = PriceSampleBuffer::new(10).unwrap();

        for i in 0..10 {
            let point = buffer.update(PriceSample::new(100.0, 0.0, i));
            assert!(generator.evaluate(&point, 0.1).is_none());
        }
        let seed = buffer.update(PriceSample::new(101.0, 0.0, 10));
        assert!(generator.evaluate(&seed, 0.1).is_none());

        let point = buffer.update(PriceSample::new(110.0, 0.0, 11));
        let signal = generator.evaluate(&point, 0.1).unwrap();
        assert_eq!(signal.direction, OrderSide::Buy);
        assert_eq!(signal.reference_price, 110.0);
        assert_eq!(generator.warmup_samples(), 12);
    }
}
