use anyhow::{anyhow, Context};
use clap::Parser;
use std::sync::Arc;
use swapbot::api::{Cluster, HermesClient, JupiterClient, SolanaRpcClient};
use swapbot::config::{AppConfig, FeedKind, ParamsHandle};
use swapbot::execution::{
    spawn_balance_poller, OrderExecutor, Pipeline, PipelineEvent, PipelineHandle, PriceQuoter,
    SharedWallet, SwapQuoter, Wallet, WalletMode,
};
use swapbot::feed::{HermesPriceFeed, PriceFeed, SyntheticPriceFeed};
use swapbot::portfolio::{Worth, WorthTracker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "swapbot", about = "Oracle-driven EMA trend swap bot")]
struct Args {
    /// Wallet mode
    #[arg(long, value_enum)]
    mode: Option<WalletMode>,

    /// Solana cluster for live balances
    #[arg(long, value_enum)]
    cluster: Option<Cluster>,

    /// Price feed source
    #[arg(long, value_enum)]
    feed: Option<FeedKind>,

    /// Minimum EMA move in percent that triggers a signal
    #[arg(long)]
    yield_threshold: Option<f64>,

    /// Order size in units of the input token
    #[arg(long)]
    order_size: Option<f64>,

    /// Wallet public key (live mode)
    #[arg(long)]
    wallet: Option<String>,

    /// Config file (defaults to ./swapbot.toml when present)
    #[arg(long)]
    config: Option<String>,

    /// Quote mock fills through Jupiter instead of the reference price
    #[arg(long)]
    jupiter_quotes: bool,
}

/// Command typed on stdin while the bot runs
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Yield(f64),
    Size(f64),
    Reset,
    Status,
    Quit,
}

// ============================================================================
// Session State
// ============================================================================

struct Session {
    config: AppConfig,
    params: ParamsHandle,
    wallet: SharedWallet,
    tracker: Option<WorthTracker>,
    /// `None` while the oracle has no current price
    latest_price: Option<f64>,
    latest_worth: Option<Worth>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!("🚀 Swapbot starting");
    tracing::info!("📊 Configuration:");
    tracing::info!("  Mode: {:?}", config.mode);
    tracing::info!("  Feed: {:?} ({})", config.feed, config.symbol);
    tracing::info!("  Yield threshold: {}%", config.yield_threshold_pct);
    tracing::info!("  Order size: {}", config.order_size);
    tracing::info!("  Window: {} samples", config.window);
    tracing::info!("  Aggregation window: {}ms", config.aggregation_window_ms);

    let params = ParamsHandle::new(config.trading_params())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (wallet, poller) = build_wallet(&config, &args, shutdown_rx).await?;
    let executor: Arc<dyn OrderExecutor> = wallet.clone();

    let mut pipeline = Pipeline::new(config.pipeline_config(), executor, params.subscribe())
        .start(build_feed(&config))
        .map_err(|e| anyhow!(e))
        .context("failed to start pipeline")?;

    let mut session = Session {
        config,
        params,
        wallet,
        tracker: None,
        latest_price: None,
        latest_worth: None,
    };

    tracing::info!("Commands: yield <pct> | size <amount> | reset | status | quit");
    tracing::info!("Press Ctrl+C to stop...");

    run(&mut session, &mut pipeline).await;

    pipeline.stop().await;
    let _ = shutdown_tx.send(true);
    if let Some(poller) = poller {
        let _ = poller.await;
    }

    log_status(&session, &pipeline).await;
    tracing::info!("👋 Swapbot stopped");
    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swapbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// File and environment first, then command-line flags on top
fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref())?;

    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(cluster) = args.cluster {
        config.cluster = cluster;
    }
    if let Some(feed) = args.feed {
        config.feed = feed;
    }
    if let Some(threshold) = args.yield_threshold {
        config.yield_threshold_pct = threshold;
    }
    if let Some(size) = args.order_size {
        config.order_size = size;
    }
    if let Some(wallet) = &args.wallet {
        config.wallet = Some(wallet.clone());
    }

    config.validate()?;
    Ok(config)
}

fn jupiter_client(config: &AppConfig) -> JupiterClient {
    JupiterClient::with_base_url(config.jupiter_url.clone())
}

async fn build_wallet(
    config: &AppConfig,
    args: &Args,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<(SharedWallet, Option<JoinHandle<()>>)> {
    match config.mode {
        WalletMode::Mock => {
            let quoter: Arc<dyn SwapQuoter> = if args.jupiter_quotes {
                Arc::new(jupiter_client(config))
            } else {
                Arc::new(PriceQuoter)
            };
            let balance = config.initial_balance();
            tracing::info!(base = balance.base, quote = balance.quote, "Using mock wallet");
            Ok((Wallet::mock(balance, quoter).shared(), None))
        }
        WalletMode::Live => {
            let owner = config
                .wallet
                .clone()
                .context("live mode requires a wallet public key (--wallet)")?;
            let source = Arc::new(SolanaRpcClient::new(config.cluster, owner));

            let opening = source
                .get_balances()
                .await
                .map_err(|e| anyhow!(e))
                .context("failed to read opening balances")?;
            tracing::info!(
                cluster = ?config.cluster,
                base = opening.base,
                quote = opening.quote,
                "Using live wallet"
            );

            let (balance_tx, balance_rx) = watch::channel(opening);
            let poller =
                spawn_balance_poller(source, config.balance_poll_interval(), balance_tx, shutdown);
            let wallet = Wallet::live(balance_rx, Arc::new(jupiter_client(config)));
            Ok((wallet.shared(), Some(poller)))
        }
    }
}

fn build_feed(config: &AppConfig) -> Box<dyn PriceFeed> {
    match config.feed {
        FeedKind::Hermes => {
            let client = HermesClient::with_base_url(config.hermes_url.clone());
            Box::new(
                HermesPriceFeed::new(client, config.feed_id.clone(), config.symbol.clone())
                    .with_poll_interval(config.hermes_poll_interval()),
            )
        }
        FeedKind::Synthetic => Box::new(SyntheticPriceFeed::new(
            config.symbol.clone(),
            config.scenario,
            config.seed,
        )),
    }
}

// ============================================================================
// Run Loop
// ============================================================================

async fn run(session: &mut Session, pipeline: &mut PipelineHandle) {
    let mut events = pipeline.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => handle_command(session, pipeline, command).await,
                        Err(e) => tracing::warn!("{}", e),
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(event) => handle_event(session, event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Dropped {} pipeline events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    let number = |arg: Option<&str>| -> Result<f64, String> {
        arg.ok_or_else(|| format!("'{}' needs a value", name))?
            .parse::<f64>()
            .map_err(|e| format!("invalid value for '{}': {}", name, e))
    };

    match name.as_str() {
        "yield" => Ok(Command::Yield(number(arg)?)),
        "size" => Ok(Command::Size(number(arg)?)),
        "reset" => Ok(Command::Reset),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

async fn handle_command(session: &mut Session, pipeline: &PipelineHandle, command: Command) {
    match command {
        Command::Yield(pct) => {
            if let Err(e) = session.params.set_yield_threshold(pct) {
                tracing::warn!("{}", e);
            }
        }
        Command::Size(size) => {
            if let Err(e) = session.params.set_order_size(size) {
                tracing::warn!("{}", e);
            }
        }
        Command::Reset => {
            let balance = {
                let mut wallet = session.wallet.lock().await;
                wallet.reset_wallet(Some(session.config.initial_balance()));
                wallet.balance()
            };
            // New baseline from the reset balance
            session.tracker = session
                .latest_price
                .map(|price| WorthTracker::from_balance(&balance, price));
            session.latest_worth = match (&session.tracker, session.latest_price) {
                (Some(tracker), Some(price)) => Some(tracker.recompute(&balance, price)),
                _ => None,
            };
        }
        Command::Status => log_status(session, pipeline).await,
        Command::Quit => {}
    }
}

async fn handle_event(session: &mut Session, event: PipelineEvent) {
    match event {
        PipelineEvent::Price { point, .. } => {
            let price = point.price();
            session.latest_price = Some(price);
            let balance = session.wallet.lock().await.balance();
            let tracker = session.tracker.get_or_insert_with(|| {
                let tracker = WorthTracker::from_balance(&balance, price);
                tracing::info!("💰 Starting worth: {:.4}", tracker.initial());
                tracker
            });

            let worth = tracker.recompute(&balance, price);
            tracing::debug!(price, worth = worth.current, change = %worth.change, "Worth updated");
            session.latest_worth = Some(worth);
        }
        PipelineEvent::PriceUnavailable { symbol } => {
            // Worth is not valued at a stale price
            session.latest_price = None;
            session.latest_worth = None;
            tracing::info!(symbol = %symbol, "Price currently unavailable");
        }
        PipelineEvent::Signal(signal) => {
            tracing::info!(
                direction = %signal.direction,
                price = signal.reference_price,
                "📈 Signal"
            );
        }
        PipelineEvent::Order(_) => {}
        PipelineEvent::Filled(filled) => {
            tracing::info!(
                "✅ {} {} {} -> {} {}",
                filled.order.side,
                filled.in_amount,
                filled.order.from_token,
                filled.out_amount,
                filled.order.to_token
            );
            log_worth(session).await;
        }
        PipelineEvent::ExecutionFailed { order, reason } => {
            tracing::warn!("❌ {} {} failed: {}", order.side, order.size, reason);
        }
    }
}

async fn log_worth(session: &Session) {
    let (Some(tracker), Some(price)) = (&session.tracker, session.latest_price) else {
        return;
    };
    let balance = session.wallet.lock().await.balance();
    let worth = tracker.recompute(&balance, price);
    tracing::info!(
        "💰 Worth: {:.4} (change {}) | base {:.6} | quote {:.4}",
        worth.current,
        worth.change,
        balance.base,
        balance.quote
    );
}

async fn log_status(session: &Session, pipeline: &PipelineHandle) {
    let params = session.params.current();
    let orders = session.wallet.lock().await.order_book().len();

    tracing::info!("📊 Status:");
    tracing::info!("  Yield threshold: {}%", params.yield_threshold_pct);
    tracing::info!("  Order size: {}", params.order_size);
    tracing::info!("  Pending signals: {}", pipeline.pending_signals());
    tracing::info!("  Filled orders: {}", orders);
    match session.latest_price {
        Some(price) => tracing::info!("  Latest price: {}", price),
        None => tracing::info!("  Latest price: n/a"),
    }
    log_worth(session).await;
}
