use crate::error::ExecutionError;
use crate::execution::{SwapExecutor, SwapQuote, SwapQuoter, SwapReceipt};
use crate::models::{OrderIntent, Token, TradingPair};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
const JUPITER_QUOTE_API: &str = "https://lite-api.jup.ag/swap/v1";
const DEFAULT_SLIPPAGE_BPS: u16 = 100; // 1%

/// Client for Jupiter aggregator API
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
    pair: TradingPair,
    slippage_bps: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    price_impact_pct: String,
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    pub price: f64,            // Output per unit of input (raw units)
    pub price_impact_pct: f64, // Price impact percentage
    pub in_amount: u64,
    pub out_amount: u64,
}

impl JupiterClient {
    pub fn new() -> Self {
        Self::with_base_url(JUPITER_QUOTE_API)
    }

    /// Point the client at another deployment of the quote API
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
            pair: TradingPair::default(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }

    pub fn with_pair(mut self, pair: TradingPair) -> Self {
        self.pair = pair;
        self
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url, input_mint, output_mint, amount, slippage_bps
        );
        tracing::debug!("URL: {}", url);

        let response: QuoteResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let in_amount: u64 = response.in_amount.parse()?;
        let out_amount: u64 = response.out_amount.parse()?;
        let price_impact: f64 = response.price_impact_pct.parse().unwrap_or(0.0);

        // Both amounts are raw units; callers convert with the token decimals
        let price = if in_amount == 0 {
            0.0
        } else {
            out_amount as f64 / in_amount as f64
        };

        Ok(Quote {
            price,
            price_impact_pct: price_impact,
            in_amount,
            out_amount,
        })
    }

    fn order_tokens(&self, order: &OrderIntent) -> std::result::Result<(&Token, &Token), ExecutionError> {
        let from = self
            .pair
            .token(&order.from_token)
            .ok_or_else(|| ExecutionError::Quote(format!("unknown token {}", order.from_token)))?;
        let to = self
            .pair
            .token(&order.to_token)
            .ok_or_else(|| ExecutionError::Quote(format!("unknown token {}", order.to_token)))?;
        Ok((from, to))
    }
}

impl Default for JupiterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwapQuoter for JupiterClient {
    /// Best route for `size` of the order's input token, converted to whole units
    async fn quote(&self, order: &OrderIntent) -> std::result::Result<SwapQuote, ExecutionError> {
        let (from, to) = self.order_tokens(order)?;

        let quote = self
            .get_quote(
                &from.mint_address,
                &to.mint_address,
                from.to_raw(order.size),
                self.slippage_bps,
            )
            .await
            .map_err(|e| ExecutionError::Quote(e.to_string()))?;

        tracing::debug!(
            from = %from.symbol,
            to = %to.symbol,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            price_impact_pct = quote.price_impact_pct,
            "Jupiter quote"
        );

        Ok(SwapQuote {
            in_amount: from.from_raw(quote.in_amount),
            out_amount: to.from_raw(quote.out_amount),
        })
    }
}

#[async_trait]
impl SwapExecutor for JupiterClient {
    /// Signing and submitting the swap transaction belongs to the wallet custodian
    async fn swap(&self, order: &OrderIntent) -> std::result::Result<SwapReceipt, ExecutionError> {
        let quote = SwapQuoter::quote(self, order).await?;
        Err(ExecutionError::Delegated(format!(
            "route found ({} {} -> {} {}) but no transaction signer is configured",
            quote.in_amount, order.from_token, quote.out_amount, order.to_token
        )))
    }
}
