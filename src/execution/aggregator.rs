use crate::models::{OrderSide, Signal};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

pub const DEFAULT_AGGREGATION_WINDOW_MS: u64 = 3000;

/// Signed order quantity accumulated over one aggregation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetSignal {
    /// Positive nets to a buy, negative to a sell
    pub quantity: f64,
    /// Reference price of the latest signal in the window
    pub reference_price: f64,
}

#[derive(Debug, Default)]
struct AggregationWindow {
    entries: Vec<f64>,
    last_reference_price: Option<f64>,
}

/// Tumbling window that nets raw signals into at most one quantity per flush
///
/// `ingest` and `flush` take the same lock, so a flush never observes a
/// half-appended window and nothing is appended while it drains.
#[derive(Debug, Default)]
pub struct SignalAggregator {
    window: Mutex<AggregationWindow>,
}

impl SignalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AggregationWindow> {
        // The window holds plain numbers, a poisoned lock still has usable data
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a signal as `+order_size` (buy) or `-order_size` (sell)
    ///
    /// `order_size` is the setting at ingest time; later size changes only affect
    /// later entries.
    pub fn ingest(&self, signal: &Signal, order_size: f64) {
        let magnitude = match signal.direction {
            OrderSide::Buy => order_size,
            OrderSide::Sell => -order_size,
        };

        let mut window = self.lock();
        window.entries.push(magnitude);
        window.last_reference_price = Some(signal.reference_price);
    }

    /// Drain the window and return its net quantity
    ///
    /// Returns `None` for an empty window or one that nets to exactly zero. The
    /// window is cleared either way.
    pub fn flush(&self) -> Option<NetSignal> {
        let drained = std::mem::take(&mut *self.lock());

        let mut entries = drained.entries;
        if entries.is_empty() {
            return None;
        }

        // Sorted so the float sum does not depend on arrival order
        entries.sort_by(f64::total_cmp);
        let quantity: f64 = entries.iter().sum();

        if quantity == 0.0 {
            tracing::debug!(signals = entries.len(), "Aggregation window netted to zero");
            return None;
        }

        Some(NetSignal {
            quantity,
            reference_price: drained.last_reference_price.unwrap_or_default(),
        })
    }

    /// Number of signals waiting for the next flush
    pub fn pending(&self) -> usize {
        self.lock().entries.len()
    }
}

/// Run `flush` every `period` until shutdown, forwarding non-zero nets
///
/// The first flush happens one full period after the loop starts.
pub fn spawn_flush_loop(
    aggregator: Arc<SignalAggregator>,
    period: Duration,
    net_tx: tokio::sync::mpsc::Sender<NetSignal>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Some(net) = aggregator.flush() {
                        tracing::info!(
                            quantity = net.quantity,
                            price = net.reference_price,
                            "Aggregation window flushed"
                        );
                        if net_tx.send(net).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("Flush loop stopped");
    })
}
