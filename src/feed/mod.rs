// Price feed sources
pub mod hermes;
pub mod synthetic;

pub use hermes::HermesPriceFeed;
pub use synthetic::{MarketScenario, SyntheticPriceFeed, SyntheticPriceGenerator};

use crate::error::FeedError;
use crate::models::PriceUpdate;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub const FEED_CHANNEL_CAPACITY: usize = 256;

/// Subscribe/unsubscribe pair over an oracle price stream
///
/// `stop` must be idempotent and must leave no task running.
pub trait PriceFeed: Send {
    fn start(&mut self) -> Result<mpsc::Receiver<PriceUpdate>, FeedError>;

    fn stop(&mut self);

    /// Instrument this feed publishes
    fn symbol(&self) -> &str;
}

/// Background producer task owned by a feed
#[derive(Default)]
pub(crate) struct FeedTask {
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl FeedTask {
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the producer built by `f` with a fresh shutdown receiver
    pub(crate) fn spawn<F, Fut>(&mut self, f: F)
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        self.shutdown = Some(tx);
        self.handle = Some(tokio::spawn(f(rx)));
    }

    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for FeedTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Feed driven by the caller through an `mpsc::Sender`
///
/// Used for replays and tests.
pub struct ChannelPriceFeed {
    symbol: String,
    rx: Option<mpsc::Receiver<PriceUpdate>>,
    stopped: bool,
}

impl ChannelPriceFeed {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> (Self, mpsc::Sender<PriceUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        let feed = Self {
            symbol: symbol.into(),
            rx: Some(rx),
            stopped: false,
        };
        (feed, tx)
    }
}

impl PriceFeed for ChannelPriceFeed {
    fn start(&mut self) -> Result<mpsc::Receiver<PriceUpdate>, FeedError> {
        self.rx.take().ok_or(FeedError::AlreadyStarted)
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.rx = None;
            tracing::debug!(symbol = %self.symbol, "Channel feed stopped");
        }
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}
