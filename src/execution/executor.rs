use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::models::{FilledOrder, OrderIntent, OrderSide};

/// Sink that carries out an order intent
///
/// Failures are reported back to the caller; retries belong to the implementation.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute(&self, order: &OrderIntent) -> Result<FilledOrder, ExecutionError>;
}

/// Amounts a swap would move, in whole token units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapQuote {
    /// Spent from `from_token`
    pub in_amount: f64,
    /// Received in `to_token`
    pub out_amount: f64,
}

/// Prices an order without executing it (used by the mock wallet)
#[async_trait]
pub trait SwapQuoter: Send + Sync {
    async fn quote(&self, order: &OrderIntent) -> Result<SwapQuote, ExecutionError>;
}

/// Receipt of a live swap
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub quote: SwapQuote,
    pub tx_signature: String,
}

/// Executes a swap on-chain (used by the live wallet)
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn swap(&self, order: &OrderIntent) -> Result<SwapReceipt, ExecutionError>;
}

/// Quotes at the order's reference price with no slippage or fees
///
/// Buy spends `size` quote for `size / price` base, sell spends `size` base for
/// `size * price` quote.
#[derive(Debug, Clone, Default)]
pub struct PriceQuoter;

#[async_trait]
impl SwapQuoter for PriceQuoter {
    async fn quote(&self, order: &OrderIntent) -> Result<SwapQuote, ExecutionError> {
        if !(order.price > 0.0 && order.price.is_finite()) {
            return Err(ExecutionError::NoPrice(order.to_token.clone()));
        }

        let out_amount = match order.side {
            OrderSide::Buy => order.size / order.price,
            OrderSide::Sell => order.size * order.price,
        };

        Ok(SwapQuote {
            in_amount: order.size,
            out_amount,
        })
    }
}
