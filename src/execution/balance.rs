use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::models::WalletBalance;

pub const DEFAULT_BALANCE_POLL_MS: u64 = 5000;

/// Supplies balance snapshots for the live wallet
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch(&self) -> crate::Result<WalletBalance>;
}

/// Poll `source` every `period` and publish each snapshot on `balance_tx`
///
/// Failed polls are logged and the previous snapshot stays current.
pub fn spawn_balance_poller(
    source: Arc<dyn BalanceSource>,
    period: Duration,
    balance_tx: watch::Sender<WalletBalance>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
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
                    match source.fetch().await {
                        Ok(balance) => {
                            tracing::debug!(base = balance.base, quote = balance.quote, "Balance polled");
                            balance_tx.send_replace(balance);
                        }
                        Err(e) => {
                            tracing::warn!("Balance poll failed: {}", e);
                        }
                    }
                }
            }
        }

        tracing::debug!("Balance poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl BalanceSource for CountingSource {
        async fn fetch(&self) -> crate::Result<WalletBalance> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 2 {
                return Err("rpc unavailable".into());
            }
            Ok(WalletBalance {
                base: n as f64,
                quote: 100.0,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_publishes_and_survives_errors() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let (balance_tx, mut balance_rx) = watch::channel(WalletBalance::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_balance_poller(
            source.clone(),
            Duration::from_millis(5000),
            balance_tx,
            shutdown_rx,
        );

        // First tick fires immediately
        balance_rx.changed().await.unwrap();
        assert_eq!(balance_rx.borrow_and_update().base, 1.0);

        // Second poll fails, third succeeds
        balance_rx.changed().await.unwrap();
        assert_eq!(balance_rx.borrow_and_update().base, 3.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
