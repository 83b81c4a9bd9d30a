// Signal pipeline and order execution module
pub mod aggregator;
pub mod balance;
pub mod executor;
pub mod pipeline;
pub mod price_buffer;
pub mod translator;
pub mod wallet;

pub use aggregator::{spawn_flush_loop, NetSignal, SignalAggregator};
pub use balance::{spawn_balance_poller, BalanceSource};
pub use executor::{OrderExecutor, PriceQuoter, SwapExecutor, SwapQuote, SwapQuoter, SwapReceipt};
pub use pipeline::{Pipeline, PipelineConfig, PipelineEvent, PipelineHandle, SignalStage};
pub use price_buffer::PriceSampleBuffer;
pub use translator::OrderIntentTranslator;
pub use wallet::{LiveWallet, MockWallet, SharedWallet, Wallet, WalletMode};
