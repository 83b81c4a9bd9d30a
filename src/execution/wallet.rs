use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::executor::{OrderExecutor, SwapExecutor, SwapQuoter};
use crate::error::ExecutionError;
use crate::models::{FilledOrder, OrderIntent, OrderSide, WalletBalance};

pub type SharedWallet = Arc<Mutex<Wallet>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    Mock,
    Live,
}

/// Local balance model mutated after every simulated fill
pub struct MockWallet {
    balance: WalletBalance,
    quoter: Arc<dyn SwapQuoter>,
    order_book: Vec<FilledOrder>,
}

impl MockWallet {
    pub fn new(balance: WalletBalance, quoter: Arc<dyn SwapQuoter>) -> Self {
        Self {
            balance,
            quoter,
            order_book: Vec::new(),
        }
    }

    /// Quote the order and apply it to the local balances
    ///
    /// Buy: quote -= in, base += out. Sell: base -= in, quote += out.
    pub async fn add_order(&mut self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        let quote = self.quoter.quote(order).await?;

        match order.side {
            OrderSide::Buy => {
                self.balance.quote -= quote.in_amount;
                self.balance.base += quote.out_amount;
            }
            OrderSide::Sell => {
                self.balance.base -= quote.in_amount;
                self.balance.quote += quote.out_amount;
            }
        }

        if self.balance.base < 0.0 || self.balance.quote < 0.0 {
            tracing::warn!(
                base = self.balance.base,
                quote = self.balance.quote,
                "Mock balance went negative"
            );
        }

        let filled = FilledOrder::new(order.clone(), quote.in_amount, quote.out_amount, true);
        self.order_book.push(filled.clone());
        Ok(filled)
    }

    pub fn reset_wallet(&mut self, params: Option<WalletBalance>) {
        self.balance = params.unwrap_or_default();
        self.order_book.clear();
    }
}

/// Wallet whose balances come from a polled on-chain snapshot
pub struct LiveWallet {
    balance: watch::Receiver<WalletBalance>,
    swapper: Arc<dyn SwapExecutor>,
    order_book: Vec<FilledOrder>,
}

impl LiveWallet {
    pub fn new(balance: watch::Receiver<WalletBalance>, swapper: Arc<dyn SwapExecutor>) -> Self {
        Self {
            balance,
            swapper,
            order_book: Vec::new(),
        }
    }

    /// Hand the order to the swap collaborator; balances follow the next poll
    pub async fn add_order(&mut self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        let receipt = self.swapper.swap(order).await?;

        let mut filled = FilledOrder::new(
            order.clone(),
            receipt.quote.in_amount,
            receipt.quote.out_amount,
            false,
        );
        filled.tx_signature = Some(receipt.tx_signature);

        self.order_book.push(filled.clone());
        Ok(filled)
    }

    /// On-chain balances cannot be reset; only the local order book is cleared
    pub fn reset_wallet(&mut self) {
        self.order_book.clear();
    }
}

/// Wallet variant, selected once per session
pub enum Wallet {
    Mock(MockWallet),
    Live(LiveWallet),
}

impl Wallet {
    pub fn mock(balance: WalletBalance, quoter: Arc<dyn SwapQuoter>) -> Self {
        Wallet::Mock(MockWallet::new(balance, quoter))
    }

    pub fn live(balance: watch::Receiver<WalletBalance>, swapper: Arc<dyn SwapExecutor>) -> Self {
        Wallet::Live(LiveWallet::new(balance, swapper))
    }

    pub fn shared(self) -> SharedWallet {
        Arc::new(Mutex::new(self))
    }

    pub fn mode(&self) -> WalletMode {
        match self {
            Wallet::Mock(_) => WalletMode::Mock,
            Wallet::Live(_) => WalletMode::Live,
        }
    }

    /// Latest known balance
    pub fn balance(&self) -> WalletBalance {
        match self {
            Wallet::Mock(w) => w.balance,
            Wallet::Live(w) => *w.balance.borrow(),
        }
    }

    /// Filled orders, oldest first
    pub fn order_book(&self) -> &[FilledOrder] {
        match self {
            Wallet::Mock(w) => &w.order_book,
            Wallet::Live(w) => &w.order_book,
        }
    }

    pub async fn add_order(&mut self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        let filled = match self {
            Wallet::Mock(w) => w.add_order(order).await?,
            Wallet::Live(w) => w.add_order(order).await?,
        };

        tracing::info!(
            id = %filled.id,
            side = %order.side,
            size = order.size,
            price = order.price,
            in_amount = filled.in_amount,
            out_amount = filled.out_amount,
            mock = filled.mock,
            "Order filled"
        );

        Ok(filled)
    }

    /// Restore the starting balance (mock) and clear the order book
    pub fn reset_wallet(&mut self, params: Option<WalletBalance>) {
        match self {
            Wallet::Mock(w) => w.reset_wallet(params),
            Wallet::Live(w) => w.reset_wallet(),
        }
        tracing::info!(mode = ?self.mode(), "Wallet reset");
    }
}

#[async_trait]
impl OrderExecutor for Mutex<Wallet> {
    async fn execute(&self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError> {
        self.lock().await.add_order(order).await
    }
}
