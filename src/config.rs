use crate::api::{Cluster, SOL_USD_FEED_ID, SOL_USD_SYMBOL};
use crate::error::ConfigError;
use crate::execution::aggregator::DEFAULT_AGGREGATION_WINDOW_MS;
use crate::execution::balance::DEFAULT_BALANCE_POLL_MS;
use crate::execution::price_buffer::DEFAULT_WINDOW;
use crate::execution::{PipelineConfig, WalletMode};
use crate::feed::hermes::DEFAULT_HERMES_POLL_MS;
use crate::feed::MarketScenario;
use crate::models::WalletBalance;
use crate::strategy::trend::DEFAULT_YIELD_THRESHOLD_PCT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_ORDER_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Pyth oracle via Hermes
    Hermes,
    /// Seeded random walk
    Synthetic,
}

/// User-adjustable trading parameters, read by the pipeline at use time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingParams {
    /// Minimum EMA move, in percent, that triggers a signal
    pub yield_threshold_pct: f64,
    /// Signal magnitude, in units of the order's input token
    pub order_size: f64,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            yield_threshold_pct: DEFAULT_YIELD_THRESHOLD_PCT,
            order_size: DEFAULT_ORDER_SIZE,
        }
    }
}

impl TradingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_yield_threshold(self.yield_threshold_pct)?;
        validate_order_size(self.order_size)
    }
}

fn validate_order_size(order_size: f64) -> Result<(), ConfigError> {
    if order_size > 0.0 && order_size.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidOrderSize(order_size))
    }
}

fn validate_yield_threshold(threshold: f64) -> Result<(), ConfigError> {
    if threshold >= 0.0 && threshold.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidYieldThreshold(threshold))
    }
}

/// Publishes validated parameter changes to running pipelines
#[derive(Debug, Clone)]
pub struct ParamsHandle {
    tx: std::sync::Arc<watch::Sender<TradingParams>>,
}

impl ParamsHandle {
    pub fn new(params: TradingParams) -> Result<Self, ConfigError> {
        params.validate()?;
        let (tx, _rx) = watch::channel(params);
        Ok(Self {
            tx: std::sync::Arc::new(tx),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<TradingParams> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> TradingParams {
        *self.tx.borrow()
    }

    pub fn set_yield_threshold(&self, threshold: f64) -> Result<(), ConfigError> {
        validate_yield_threshold(threshold)?;
        self.tx.send_modify(|p| p.yield_threshold_pct = threshold);
        tracing::info!(yield_threshold_pct = threshold, "Yield threshold updated");
        Ok(())
    }

    pub fn set_order_size(&self, order_size: f64) -> Result<(), ConfigError> {
        validate_order_size(order_size)?;
        self.tx.send_modify(|p| p.order_size = order_size);
        tracing::info!(order_size, "Order size updated");
        Ok(())
    }
}

/// Application configuration
///
/// Layered as: built-in defaults, optional TOML file, `SWAPBOT_*` environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: WalletMode,
    pub cluster: Cluster,
    pub feed: FeedKind,
    pub symbol: String,
    pub feed_id: String,
    pub hermes_url: String,
    pub hermes_poll_ms: u64,
    pub jupiter_url: String,
    /// Wallet public key for live balances
    pub wallet: Option<String>,
    pub yield_threshold_pct: f64,
    pub order_size: f64,
    pub window: usize,
    pub max_history: Option<usize>,
    pub aggregation_window_ms: u64,
    pub balance_poll_ms: u64,
    pub initial_base: f64,
    pub initial_quote: f64,
    pub scenario: MarketScenario,
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let balance = WalletBalance::default();
        Self {
            mode: WalletMode::Mock,
            cluster: Cluster::Devnet,
            feed: FeedKind::Hermes,
            symbol: SOL_USD_SYMBOL.to_string(),
            feed_id: SOL_USD_FEED_ID.to_string(),
            hermes_url: "https://hermes.pyth.network".to_string(),
            hermes_poll_ms: DEFAULT_HERMES_POLL_MS,
            jupiter_url: "https://lite-api.jup.ag/swap/v1".to_string(),
            wallet: None,
            yield_threshold_pct: DEFAULT_YIELD_THRESHOLD_PCT,
            order_size: DEFAULT_ORDER_SIZE,
            window: DEFAULT_WINDOW,
            max_history: None,
            aggregation_window_ms: DEFAULT_AGGREGATION_WINDOW_MS,
            balance_poll_ms: DEFAULT_BALANCE_POLL_MS,
            initial_base: balance.base,
            initial_quote: balance.quote,
            scenario: MarketScenario::Sideways,
            seed: 42,
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// # Arguments
    /// * `path` - Explicit config file (must exist). Without it `swapbot.toml` is
    ///   read when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name("swapbot").required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(config::Environment::with_prefix("SWAPBOT").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Reject settings that must not reach the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trading_params().validate()?;
        self.pipeline_config().validate()?;

        if self.hermes_poll_ms == 0 {
            return Err(ConfigError::InvalidInterval("price feed poll"));
        }
        if self.balance_poll_ms == 0 {
            return Err(ConfigError::InvalidInterval("balance poll"));
        }
        Ok(())
    }

    pub fn trading_params(&self) -> TradingParams {
        TradingParams {
            yield_threshold_pct: self.yield_threshold_pct,
            order_size: self.order_size,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            symbol: self.symbol.clone(),
            window: self.window,
            max_history: self.max_history,
            aggregation_window: Duration::from_millis(self.aggregation_window_ms),
        }
    }

    pub fn initial_balance(&self) -> WalletBalance {
        WalletBalance {
            base: self.initial_base,
            quote: self.initial_quote,
        }
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_millis(self.balance_poll_ms)
    }

    pub fn hermes_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hermes_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window, 10);
        assert_eq!(config.aggregation_window_ms, 3000);
        assert_eq!(config.balance_poll_ms, 5000);
        assert_eq!(config.trading_params(), TradingParams::default());
    }

    #[test]
    fn test_non_positive_order_size_rejected() {
        let config = AppConfig {
            order_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidOrderSize(_))));

        let config = AppConfig {
            order_size: -5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = AppConfig {
            window: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(0))));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let config = AppConfig {
            aggregation_window_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval(_))));

        let config = AppConfig {
            balance_poll_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_params_handle_updates_subscribers() {
        let handle = ParamsHandle::new(TradingParams::default()).unwrap();
        let rx = handle.subscribe();

        handle.set_yield_threshold(0.25).unwrap();
        handle.set_order_size(35.0).unwrap();
        assert_eq!(rx.borrow().yield_threshold_pct, 0.25);
        assert_eq!(rx.borrow().order_size, 35.0);

        // Invalid updates are rejected and leave the value alone
        assert!(handle.set_order_size(0.0).is_err());
        assert!(handle.set_yield_threshold(f64::NAN).is_err());
        assert_eq!(handle.current().order_size, 35.0);
        assert_eq!(handle.current().yield_threshold_pct, 0.25);
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let params = TradingParams {
            yield_threshold_pct: -1.0,
            order_size: 20.0,
        };
        assert!(ParamsHandle::new(params).is_err());
    }
}
