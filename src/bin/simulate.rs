use anyhow::anyhow;
use clap::Parser;
use std::sync::Arc;
use swapbot::api::SOL_USD_SYMBOL;
use swapbot::config::{TradingParams, DEFAULT_ORDER_SIZE};
use swapbot::execution::aggregator::DEFAULT_AGGREGATION_WINDOW_MS;
use swapbot::execution::{
    OrderIntentTranslator, PipelineConfig, PriceQuoter, SignalAggregator, SignalStage, Wallet,
};
use swapbot::feed::{MarketScenario, SyntheticPriceGenerator};
use swapbot::portfolio::{PercentChange, WorthTracker};
use swapbot::strategy::trend::DEFAULT_YIELD_THRESHOLD_PCT;
use swapbot::strategy::SignalGenerator;
use swapbot::WalletBalance;
use tokio::sync::broadcast;

/// Replay synthetic oracle prices through the signal pipeline against a mock wallet
#[derive(Parser, Debug)]
#[command(name = "simulate")]
struct Args {
    /// Scenario to run (all scenarios when omitted)
    #[arg(long, value_enum)]
    scenario: Option<MarketScenario>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of oracle ticks to replay
    #[arg(long, default_value_t = 2000)]
    ticks: usize,

    /// Simulated time between ticks
    #[arg(long, default_value_t = 400)]
    tick_ms: i64,

    #[arg(long, default_value_t = DEFAULT_YIELD_THRESHOLD_PCT)]
    yield_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_ORDER_SIZE)]
    order_size: f64,

    #[arg(long, default_value_t = DEFAULT_AGGREGATION_WINDOW_MS as i64)]
    aggregation_ms: i64,
}

struct SimulationResult {
    name: String,
    signals: usize,
    orders: usize,
    failed: usize,
    final_balance: WalletBalance,
    worth: f64,
    change: PercentChange,
}

// Drains the window and fills the net order, if any
async fn flush_window(
    aggregator: &SignalAggregator,
    translator: &OrderIntentTranslator,
    wallet: &mut Wallet,
    failed: &mut usize,
) {
    let Some(net) = aggregator.flush() else {
        return;
    };
    let Some(order) = translator.translate(net.quantity, net.reference_price) else {
        return;
    };
    if let Err(e) = wallet.add_order(&order).await {
        tracing::warn!("Simulated order failed: {}", e);
        *failed += 1;
    }
}

async fn simulate(scenario: MarketScenario, args: &Args) -> anyhow::Result<SimulationResult> {
    let params = TradingParams {
        yield_threshold_pct: args.yield_threshold,
        order_size: args.order_size,
    };
    params.validate()?;
    if args.aggregation_ms <= 0 || args.tick_ms <= 0 {
        return Err(anyhow!("tick and aggregation intervals must be positive"));
    }

    let config = PipelineConfig::default();
    let (events, _) = broadcast::channel(16);
    let aggregator = Arc::new(SignalAggregator::new());
    let mut stage = SignalStage::new(
        &config,
        Box::new(SignalGenerator::new(config.window)),
        aggregator.clone(),
        events,
    )?;
    let translator = OrderIntentTranslator::default();
    let mut wallet = Wallet::mock(WalletBalance::default(), Arc::new(PriceQuoter));

    let mut generator = SyntheticPriceGenerator::new(scenario, args.seed, 150.0);
    let updates = generator.generate(SOL_USD_SYMBOL, args.ticks, 0, args.tick_ms);

    let mut tracker: Option<WorthTracker> = None;
    let mut latest_price = None;
    let mut signals = 0;
    let mut failed = 0;
    let mut next_flush = args.aggregation_ms;

    for update in &updates {
        while update.timestamp_ms >= next_flush {
            flush_window(&aggregator, &translator, &mut wallet, &mut failed).await;
            next_flush += args.aggregation_ms;
        }

        if let Some(price) = update.price {
            latest_price = Some(price);
            if tracker.is_none() {
                tracker = Some(WorthTracker::from_balance(&wallet.balance(), price));
            }
        }

        if stage.on_update(update, &params).is_some() {
            signals += 1;
        }
    }
    flush_window(&aggregator, &translator, &mut wallet, &mut failed).await;

    let final_balance = wallet.balance();
    let (worth, change) = match (tracker, latest_price) {
        (Some(tracker), Some(price)) => {
            let worth = tracker.recompute(&final_balance, price);
            (worth.current, worth.change)
        }
        _ => (0.0, PercentChange::NotComputable),
    };

    Ok(SimulationResult {
        name: format!("{:?}", scenario),
        signals,
        orders: wallet.order_book().len(),
        failed,
        final_balance,
        worth,
        change,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("swapbot=warn")
        .init();

    let args = Args::parse();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║             SWAPBOT PIPELINE SIMULATION               ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let scenarios = match args.scenario {
        Some(scenario) => vec![scenario],
        None => vec![
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
            MarketScenario::Outage,
        ],
    };

    let mut results = Vec::new();
    for scenario in scenarios {
        match simulate(scenario, &args).await {
            Ok(result) => results.push(result),
            Err(e) => eprintln!("❌ Simulation failed for {:?}: {}", scenario, e),
        }
    }

    print_summary(&results);
    Ok(())
}

fn print_summary(results: &[SimulationResult]) {
    println!(
        "\n{:<12} {:>8} {:>8} {:>8} {:>12} {:>12} {:>12} {:>12}",
        "Scenario", "Signals", "Orders", "Failed", "Base", "Quote", "Worth", "Change"
    );
    println!("{}", "─".repeat(92));

    for r in results {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>12.6} {:>12.4} {:>12.4} {:>12}",
            r.name,
            r.signals,
            r.orders,
            r.failed,
            r.final_balance.base,
            r.final_balance.quote,
            r.worth,
            r.change.to_string()
        );
    }

    println!("\n═══════════════════════════════════════════════════════\n");
}
