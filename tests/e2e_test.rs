use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swapbot::api::SOL_USD_SYMBOL;
use swapbot::config::{ParamsHandle, TradingParams};
use swapbot::execution::{
    OrderExecutor, Pipeline, PipelineConfig, PipelineEvent, PipelineHandle, PriceQuoter, SharedWallet,
    Wallet,
};
use swapbot::feed::ChannelPriceFeed;
use swapbot::portfolio::{PercentChange, WorthTracker};
use swapbot::{ExecutionError, FilledOrder, OrderIntent, OrderSide, PriceUpdate, WalletBalance};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;

fn params(threshold: f64, size: f64) -> ParamsHandle {
    ParamsHandle::new(TradingParams {
        yield_threshold_pct: threshold,
        order_size: size,
    })
    .unwrap()
}

fn mock_wallet() -> SharedWallet {
    Wallet::mock(WalletBalance::default(), Arc::new(PriceQuoter)).shared()
}

fn start(
    executor: Arc<dyn OrderExecutor>,
    params: &ParamsHandle,
) -> (PipelineHandle, mpsc::Sender<PriceUpdate>, broadcast::Receiver<PipelineEvent>) {
    let (feed, tx) = ChannelPriceFeed::new(SOL_USD_SYMBOL, 64);
    let handle = Pipeline::new(PipelineConfig::default(), executor, params.subscribe())
        .start(Box::new(feed))
        .unwrap();
    let events = handle.subscribe();
    (handle, tx, events)
}

async fn send_price(tx: &mpsc::Sender<PriceUpdate>, symbol: &str, price: Option<f64>) {
    tx.send(PriceUpdate {
        symbol: symbol.to_string(),
        price,
        confidence: price.map(|p| p * 0.0005),
        timestamp_ms: 0,
    })
    .await
    .unwrap();
}

/// Ten flat ticks, the EMA seed tick, then a jump to 110
async fn send_jump(tx: &mpsc::Sender<PriceUpdate>) {
    for _ in 0..10 {
        send_price(tx, SOL_USD_SYMBOL, Some(100.0)).await;
    }
    send_price(tx, SOL_USD_SYMBOL, Some(101.0)).await;
    send_price(tx, SOL_USD_SYMBOL, Some(110.0)).await;
}

async fn next_filled(events: &mut broadcast::Receiver<PipelineEvent>) -> FilledOrder {
    loop {
        if let PipelineEvent::Filled(filled) = events.recv().await.unwrap() {
            return filled;
        }
    }
}

async fn wait_for_prices(events: &mut broadcast::Receiver<PipelineEvent>, count: usize) {
    let mut seen = 0;
    while seen < count {
        if let PipelineEvent::Price { .. } = events.recv().await.unwrap() {
            seen += 1;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_oracle_jump_fills_mock_buy() {
    let _ = tracing_subscriber::fmt::try_init();

    let wallet = mock_wallet();
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(wallet.clone(), &params);

    send_jump(&tx).await;

    let filled = next_filled(&mut events).await;
    assert_eq!(filled.order.side, OrderSide::Buy);
    assert_eq!(filled.order.size, 20.0);
    assert_eq!(filled.order.price, 110.0);
    assert_eq!(filled.order.from_token, "USDC");
    assert_eq!(filled.order.to_token, "SOL");
    assert!(filled.mock);

    let balance = wallet.lock().await.balance();
    assert_eq!(balance.quote, 1380.0);
    assert!((balance.base - (10.0 + 20.0 / 110.0)).abs() < 1e-12);

    // A fill at the reference price leaves worth unchanged
    let tracker = WorthTracker::from_balance(&WalletBalance::default(), 110.0);
    let worth = tracker.recompute(&balance, 110.0);
    assert!((worth.current - 2500.0).abs() < 1e-9);
    match worth.change {
        PercentChange::Computable(pct) => assert!(pct.abs() < 1e-9),
        PercentChange::NotComputable => panic!("worth change should be computable"),
    }

    handle.stop().await;
}

struct FlakyExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl OrderExecutor for FlakyExecutor {
    async fn execute(&self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ExecutionError::Quote("route not found".to_string()));
        }
        Ok(FilledOrder::new(order.clone(), order.size, order.size / order.price, true))
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_order_does_not_stop_pipeline() {
    let executor = Arc::new(FlakyExecutor {
        calls: AtomicUsize::new(0),
    });
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(executor.clone(), &params);

    send_jump(&tx).await;

    loop {
        if let PipelineEvent::ExecutionFailed { order, reason } = events.recv().await.unwrap() {
            assert_eq!(order.side, OrderSide::Buy);
            assert!(reason.contains("route not found"));
            break;
        }
    }

    // Next window still reaches the executor
    send_price(&tx, SOL_USD_SYMBOL, Some(130.0)).await;
    let filled = next_filled(&mut events).await;
    assert_eq!(filled.order.side, OrderSide::Buy);
    assert_eq!(filled.order.price, 130.0);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent_and_cancels_flush() {
    let wallet = mock_wallet();
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(wallet.clone(), &params);

    send_jump(&tx).await;
    loop {
        if let PipelineEvent::Signal(signal) = events.recv().await.unwrap() {
            assert_eq!(signal.direction, OrderSide::Buy);
            break;
        }
    }

    handle.stop().await;
    handle.stop().await;
    assert!(handle.is_stopped());

    // The pending window is never flushed
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.pending_signals(), 1);
    assert!(wallet.lock().await.order_book().is_empty());
    assert_eq!(wallet.lock().await.balance(), WalletBalance::default());
}

#[tokio::test(start_paused = true)]
async fn test_threshold_change_applies_to_next_evaluation() {
    let wallet = mock_wallet();
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(wallet.clone(), &params);

    params.set_yield_threshold(5.0).unwrap();
    send_jump(&tx).await;
    wait_for_prices(&mut events, 12).await;
    assert_eq!(handle.pending_signals(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(wallet.lock().await.order_book().is_empty());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_and_foreign_prices_are_skipped() {
    let wallet = mock_wallet();
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(wallet.clone(), &params);

    send_price(&tx, "Crypto.BTC/USD", Some(60_000.0)).await;
    send_price(&tx, SOL_USD_SYMBOL, None).await;
    send_price(&tx, SOL_USD_SYMBOL, Some(150.0)).await;

    match events.recv().await.unwrap() {
        PipelineEvent::PriceUnavailable { symbol } => assert_eq!(symbol, SOL_USD_SYMBOL),
        other => panic!("unexpected event {:?}", other),
    }
    match events.recv().await.unwrap() {
        PipelineEvent::Price { symbol, point } => {
            assert_eq!(symbol, SOL_USD_SYMBOL);
            assert_eq!(point.price(), 150.0);
            assert!(point.sma.is_none());
            assert!(point.trend.is_none());
        }
        other => panic!("unexpected event {:?}", other),
    }

    handle.stop().await;
}

/// Accepts orders and never completes them
struct HangingExecutor;

#[async_trait]
impl OrderExecutor for HangingExecutor {
    async fn execute(&self, _order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_hung_order() {
    let params = params(0.1, 20.0);
    let (mut handle, tx, mut events) = start(Arc::new(HangingExecutor), &params);

    send_jump(&tx).await;
    loop {
        if let PipelineEvent::Order(order) = events.recv().await.unwrap() {
            assert_eq!(order.side, OrderSide::Buy);
            break;
        }
    }

    let stopped = tokio::time::timeout(Duration::from_secs(3600), handle.stop()).await;
    assert!(stopped.is_ok(), "stop should not wait on a hung executor");
    assert!(handle.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_cancels_flush() {
    let wallet = mock_wallet();
    let params = params(0.1, 20.0);
    let (handle, tx, mut events) = start(wallet.clone(), &params);

    send_jump(&tx).await;
    loop {
        if let PipelineEvent::Signal(_) = events.recv().await.unwrap() {
            break;
        }
    }

    drop(handle);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(wallet.lock().await.order_book().is_empty());
    assert_eq!(wallet.lock().await.balance(), WalletBalance::default());
}
