use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use super::aggregator::{spawn_flush_loop, NetSignal, SignalAggregator, DEFAULT_AGGREGATION_WINDOW_MS};
use super::executor::OrderExecutor;
use super::price_buffer::{PriceSampleBuffer, DEFAULT_WINDOW};
use super::translator::OrderIntentTranslator;
use crate::api::SOL_USD_SYMBOL;
use crate::config::TradingParams;
use crate::error::ConfigError;
use crate::feed::PriceFeed;
use crate::models::{FilledOrder, IndicatorPoint, OrderIntent, PriceSample, PriceUpdate, Signal};
use crate::strategy::{SignalGenerator, Strategy};

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
const NET_CHANNEL_CAPACITY: usize = 16;

/// How long `stop` waits for each task before aborting it
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Instrument to trade; updates for other symbols are dropped
    pub symbol: String,
    pub window: usize,
    /// Optional cap on retained samples, must exceed `window`
    pub max_history: Option<usize>,
    pub aggregation_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbol: SOL_USD_SYMBOL.to_string(),
            window: DEFAULT_WINDOW,
            max_history: None,
            aggregation_window: Duration::from_millis(DEFAULT_AGGREGATION_WINDOW_MS),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer().map(|_| ())?;
        if self.aggregation_window.is_zero() {
            return Err(ConfigError::InvalidInterval("aggregation window"));
        }
        Ok(())
    }

    fn buffer(&self) -> Result<PriceSampleBuffer, ConfigError> {
        match self.max_history {
            Some(cap) => PriceSampleBuffer::with_capacity(self.window, cap),
            None => PriceSampleBuffer::new(self.window),
        }
    }
}

/// Notifications published by a running pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A sample was recorded
    Price { symbol: String, point: IndicatorPoint },
    /// The oracle reported no current price
    PriceUnavailable { symbol: String },
    Signal(Signal),
    /// A net quantity was translated and handed to the executor
    Order(OrderIntent),
    Filled(FilledOrder),
    ExecutionFailed { order: OrderIntent, reason: String },
}

/// Per-update half of the pipeline: buffer, strategy, aggregation
///
/// Runs synchronously inside the ingest task so updates are processed strictly in
/// arrival order.
pub struct SignalStage {
    symbol: String,
    buffer: PriceSampleBuffer,
    strategy: Box<dyn Strategy>,
    aggregator: Arc<SignalAggregator>,
    events: broadcast::Sender<PipelineEvent>,
}

impl SignalStage {
    pub fn new(
        config: &PipelineConfig,
        strategy: Box<dyn Strategy>,
        aggregator: Arc<SignalAggregator>,
        events: broadcast::Sender<PipelineEvent>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: config.symbol.clone(),
            buffer: config.buffer()?,
            strategy,
            aggregator,
            events,
        })
    }

    /// Process one feed update with the parameters current at this moment
    ///
    /// Returns the signal the update produced, if any.
    pub fn on_update(&mut self, update: &PriceUpdate, params: &TradingParams) -> Option<Signal> {
        if update.symbol != self.symbol {
            tracing::debug!(symbol = %update.symbol, "Ignoring update for untracked symbol");
            return None;
        }

        let Some(price) = update.price else {
            let _ = self.events.send(PipelineEvent::PriceUnavailable {
                symbol: update.symbol.clone(),
            });
            return None;
        };

        let sample = PriceSample::new(price, update.confidence.unwrap_or(0.0), update.timestamp_ms);
        let point = self.buffer.update(sample);

        tracing::debug!(
            price,
            sma = ?point.sma,
            ema = ?point.ema,
            trend = ?point.trend,
            "Sample recorded"
        );
        let _ = self.events.send(PipelineEvent::Price {
            symbol: update.symbol.clone(),
            point,
        });

        let signal = self.strategy.evaluate(&point, params.yield_threshold_pct)?;
        self.aggregator.ingest(&signal, params.order_size);
        let _ = self.events.send(PipelineEvent::Signal(signal));

        Some(signal)
    }

    pub fn buffer(&self) -> &PriceSampleBuffer {
        &self.buffer
    }
}

/// Price feed to order executor wiring for one session
pub struct Pipeline {
    config: PipelineConfig,
    strategy: Box<dyn Strategy>,
    translator: OrderIntentTranslator,
    executor: Arc<dyn OrderExecutor>,
    params: watch::Receiver<TradingParams>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        executor: Arc<dyn OrderExecutor>,
        params: watch::Receiver<TradingParams>,
    ) -> Self {
        let strategy = Box::new(SignalGenerator::new(config.window));
        Self {
            config,
            strategy,
            translator: OrderIntentTranslator::default(),
            executor,
            params,
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_translator(mut self, translator: OrderIntentTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Start the feed and spawn the ingest, flush and execution tasks
    pub fn start(self, mut feed: Box<dyn PriceFeed>) -> crate::Result<PipelineHandle> {
        self.config.validate()?;

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (net_tx, net_rx) = mpsc::channel(NET_CHANNEL_CAPACITY);
        let aggregator = Arc::new(SignalAggregator::new());

        let stage = SignalStage::new(
            &self.config,
            self.strategy,
            aggregator.clone(),
            events_tx.clone(),
        )?;
        let updates = feed.start()?;

        tracing::info!(
            symbol = %self.config.symbol,
            window = self.config.window,
            aggregation_ms = self.config.aggregation_window.as_millis() as u64,
            "Pipeline started"
        );

        let tasks = vec![
            spawn_ingest_loop(stage, updates, self.params, shutdown_rx.clone()),
            spawn_flush_loop(
                aggregator.clone(),
                self.config.aggregation_window,
                net_tx,
                shutdown_rx.clone(),
            ),
            spawn_execution_loop(
                self.translator,
                self.executor,
                net_rx,
                events_tx.clone(),
                shutdown_rx,
            ),
        ];

        Ok(PipelineHandle {
            feed,
            events: events_tx,
            aggregator,
            shutdown: shutdown_tx,
            tasks,
            stopped: false,
        })
    }
}

fn spawn_ingest_loop(
    mut stage: SignalStage,
    mut updates: mpsc::Receiver<PriceUpdate>,
    params: watch::Receiver<TradingParams>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                update = updates.recv() => {
                    let Some(update) = update else {
                        tracing::info!("Price feed closed");
                        break;
                    };
                    let current = *params.borrow();
                    stage.on_update(&update, &current);
                }
            }
        }

        tracing::debug!("Ingest loop stopped");
    })
}

fn spawn_execution_loop(
    translator: OrderIntentTranslator,
    executor: Arc<dyn OrderExecutor>,
    mut nets: mpsc::Receiver<NetSignal>,
    events: broadcast::Sender<PipelineEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let net = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                net = nets.recv() => match net {
                    Some(net) => net,
                    None => break,
                },
            };

            let Some(order) = translator.translate(net.quantity, net.reference_price) else {
                continue;
            };

            tracing::info!(
                side = %order.side,
                size = order.size,
                price = order.price,
                from = %order.from_token,
                to = %order.to_token,
                "Submitting order"
            );
            let _ = events.send(PipelineEvent::Order(order.clone()));

            // One order at a time; a failure never ends the loop
            match executor.execute(&order).await {
                Ok(filled) => {
                    let _ = events.send(PipelineEvent::Filled(filled));
                }
                Err(e) => {
                    tracing::warn!(side = %order.side, size = order.size, "Order failed: {}", e);
                    let _ = events.send(PipelineEvent::ExecutionFailed {
                        order,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!("Execution loop stopped");
    })
}

/// Running pipeline
///
/// Dropping the handle without `stop` aborts the tasks.
pub struct PipelineHandle {
    feed: Box<dyn PriceFeed>,
    events: broadcast::Sender<PipelineEvent>,
    aggregator: Arc<SignalAggregator>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl PipelineHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Signals waiting in the current aggregation window
    pub fn pending_signals(&self) -> usize {
        self.aggregator.pending()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the feed and wait for every task to exit
    ///
    /// An order already handed to the executor gets `STOP_GRACE_PERIOD` to
    /// complete before its task is aborted. Calling `stop` again is a no-op.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.feed.stop();
        let _ = self.shutdown.send(true);

        for mut task in self.tasks.drain(..) {
            match timeout(STOP_GRACE_PERIOD, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if !e.is_cancelled() {
                        tracing::error!("Pipeline task failed: {}", e);
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        "Pipeline task still running after {}s, aborting",
                        STOP_GRACE_PERIOD.as_secs()
                    );
                    task.abort();
                }
            }
        }

        tracing::info!("Pipeline stopped");
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.feed.stop();
    }
}
