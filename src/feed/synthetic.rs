use super::{FeedTask, PriceFeed, FEED_CHANNEL_CAPACITY};
use crate::error::FeedError;
use crate::models::PriceUpdate;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Market scenario types for synthetic price generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Sideways/choppy market around the base price
    Sideways,
    /// High volatility (±2% swings)
    Volatile,
    /// Sideways market where the oracle periodically has no price
    Outage,
}

/// Seeded random-walk price generator
pub struct SyntheticPriceGenerator {
    rng: StdRng,
    scenario: MarketScenario,
    base_price: f64,
    current_price: f64,
    tick: u64,
}

impl SyntheticPriceGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(scenario: MarketScenario, seed: u64, base_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scenario,
            base_price,
            current_price: base_price,
            tick: 0,
        }
    }

    /// Next oracle reading, `None` during a simulated outage
    pub fn next_price(&mut self) -> Option<f64> {
        self.tick += 1;

        let price = self.current_price;
        let step = match self.scenario {
            MarketScenario::Uptrend => {
                price * 0.0005 + price * self.rng.gen_range(-0.0005..0.0005)
            }
            MarketScenario::Downtrend => {
                -price * 0.0005 + price * self.rng.gen_range(-0.0005..0.0005)
            }
            MarketScenario::Sideways | MarketScenario::Outage => {
                // 10% pull to mean plus ±0.3% noise
                (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.003..0.003)
            }
            MarketScenario::Volatile => price * self.rng.gen_range(-0.02..0.02),
        };

        // Prevent price from going too low
        self.current_price = (price + step).max(self.base_price * 0.1);

        if self.scenario == MarketScenario::Outage && self.tick % 25 == 0 {
            return None;
        }

        Some(self.current_price)
    }

    /// Next update for `symbol`, with confidence at 0.05% of the price
    pub fn next_update(&mut self, symbol: &str, timestamp_ms: i64) -> PriceUpdate {
        let price = self.next_price();
        PriceUpdate {
            symbol: symbol.to_string(),
            price,
            confidence: price.map(|p| p * 0.0005),
            timestamp_ms,
        }
    }

    /// Generate `count` updates spaced `interval_ms` apart
    pub fn generate(
        &mut self,
        symbol: &str,
        count: usize,
        start_ms: i64,
        interval_ms: i64,
    ) -> Vec<PriceUpdate> {
        (0..count)
            .map(|i| self.next_update(symbol, start_ms + i as i64 * interval_ms))
            .collect()
    }
}

/// Feed publishing a synthetic price stream on a fixed cadence
pub struct SyntheticPriceFeed {
    symbol: String,
    scenario: MarketScenario,
    seed: u64,
    base_price: f64,
    tick_interval: Duration,
    task: FeedTask,
}

impl SyntheticPriceFeed {
    pub fn new(symbol: impl Into<String>, scenario: MarketScenario, seed: u64) -> Self {
        Self {
            symbol: symbol.into(),
            scenario,
            seed,
            base_price: 150.0,
            tick_interval: Duration::from_millis(400),
            task: FeedTask::default(),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }
}

impl PriceFeed for SyntheticPriceFeed {
    fn start(&mut self) -> Result<mpsc::Receiver<PriceUpdate>, FeedError> {
        if self.task.is_running() {
            return Err(FeedError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let mut generator = SyntheticPriceGenerator::new(self.scenario, self.seed, self.base_price);
        let symbol = self.symbol.clone();
        let period = self.tick_interval;

        tracing::info!(symbol = %symbol, scenario = ?self.scenario, "Starting synthetic price feed");

        self.task.spawn(move |mut shutdown| async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let update = generator.next_update(&symbol, Utc::now().timestamp_millis());
                        if tx.send(update).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        self.task.stop();
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_prices() {
        let mut a = SyntheticPriceGenerator::new(MarketScenario::Volatile, 42, 150.0);
        let mut b = SyntheticPriceGenerator::new(MarketScenario::Volatile, 42, 150.0);

        let pa: Vec<_> = (0..50).map(|_| a.next_price()).collect();
        let pb: Vec<_> = (0..50).map(|_| b.next_price()).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_uptrend_drifts_up() {
        let mut generator = SyntheticPriceGenerator::new(MarketScenario::Uptrend, 7, 150.0);
        let prices: Vec<f64> = (0..500).filter_map(|_| generator.next_price()).collect();
        assert!(prices.last().unwrap() > &150.0);
    }

    #[test]
    fn test_downtrend_drifts_down() {
        let mut generator = SyntheticPriceGenerator::new(MarketScenario::Downtrend, 7, 150.0);
        let prices: Vec<f64> = (0..500).filter_map(|_| generator.next_price()).collect();
        assert!(prices.last().unwrap() < &150.0);
    }

    #[test]
    fn test_outage_emits_missing_prices() {
        let mut generator = SyntheticPriceGenerator::new(MarketScenario::Outage, 1, 150.0);
        let updates = generator.generate("Crypto.SOL/USD", 100, 0, 400);

        let missing = updates.iter().filter(|u| u.price.is_none()).count();
        assert_eq!(missing, 4);
        assert!(updates.iter().all(|u| u.price.is_some() == u.confidence.is_some()));
        assert_eq!(updates[99].timestamp_ms, 99 * 400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_ticks_until_stopped() {
        let mut feed = SyntheticPriceFeed::new("Crypto.SOL/USD", MarketScenario::Sideways, 3)
            .with_tick_interval(Duration::from_millis(100));

        let mut rx = feed.start().unwrap();
        for _ in 0..3 {
            let update = rx.recv().await.unwrap();
            assert!(update.price.unwrap() > 0.0);
        }

        feed.stop();
        feed.stop();

        // Channel closes once the buffered updates are drained
        while rx.recv().await.is_some() {}
    }
}
