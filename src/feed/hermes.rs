use super::{FeedTask, PriceFeed, FEED_CHANNEL_CAPACITY};
use crate::api::{HermesClient, SOL_USD_FEED_ID, SOL_USD_SYMBOL};
use crate::error::FeedError;
use crate::models::PriceUpdate;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

pub const DEFAULT_HERMES_POLL_MS: u64 = 400;

/// Pyth oracle feed polled from Hermes
///
/// Publishes one update per new oracle publish time. A feed without a current
/// price is published with `price: None`.
pub struct HermesPriceFeed {
    client: HermesClient,
    feed_id: String,
    symbol: String,
    poll_interval: Duration,
    task: FeedTask,
}

impl HermesPriceFeed {
    pub fn new(client: HermesClient, feed_id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            client,
            feed_id: feed_id.into(),
            symbol: symbol.into(),
            poll_interval: Duration::from_millis(DEFAULT_HERMES_POLL_MS),
            task: FeedTask::default(),
        }
    }

    /// SOL/USD on the public Hermes endpoint
    pub fn sol_usd() -> Self {
        Self::new(HermesClient::new(), SOL_USD_FEED_ID, SOL_USD_SYMBOL)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl PriceFeed for HermesPriceFeed {
    fn start(&mut self) -> Result<mpsc::Receiver<PriceUpdate>, FeedError> {
        if self.task.is_running() {
            return Err(FeedError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let feed_id = self.feed_id.clone();
        let symbol = self.symbol.clone();
        let period = self.poll_interval;

        tracing::info!(symbol = %symbol, "Starting Pyth price feed");

        self.task.spawn(move |mut shutdown| async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_publish_time = None;
            let mut last_available = true;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }

                let update = match client.latest_price(&feed_id).await {
                    Ok(Some(price)) => {
                        if last_publish_time == Some(price.publish_time) {
                            continue;
                        }
                        last_publish_time = Some(price.publish_time);
                        last_available = true;

                        PriceUpdate {
                            symbol: symbol.clone(),
                            price: Some(price.price),
                            confidence: Some(price.confidence),
                            timestamp_ms: price.publish_time * 1000,
                        }
                    }
                    Ok(None) => {
                        // Report the outage once until a price comes back
                        if !last_available {
                            continue;
                        }
                        last_available = false;
                        tracing::info!(symbol = %symbol, "Price currently unavailable");

                        PriceUpdate {
                            symbol: symbol.clone(),
                            price: None,
                            confidence: None,
                            timestamp_ms: Utc::now().timestamp_millis(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, "Hermes poll failed: {}", e);
                        continue;
                    }
                };

                if tx.send(update).await.is_err() {
                    break;
                }
            }

            tracing::debug!(symbol = %symbol, "Pyth price feed task exited");
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if self.task.is_running() {
            tracing::info!(symbol = %self.symbol, "Stopping Pyth price feed");
        }
        self.task.stop();
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}
