use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SOL_MINT_ADDRESS: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT_ADDRESS: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Represents a cryptocurrency token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub symbol: String,
    pub mint_address: String, // Solana mint address
    pub name: String,
    pub decimals: u8,
}

impl Token {
    pub fn sol() -> Self {
        Self {
            symbol: "SOL".to_string(),
            mint_address: SOL_MINT_ADDRESS.to_string(),
            name: "Solana".to_string(),
            decimals: 9,
        }
    }

    pub fn usdc() -> Self {
        Self {
            symbol: "USDC".to_string(),
            mint_address: USDC_MINT_ADDRESS.to_string(),
            name: "USD Coin".to_string(),
            decimals: 6,
        }
    }

    /// Convert a whole-unit amount into raw on-chain units
    pub fn to_raw(&self, amount: f64) -> u64 {
        (amount * 10f64.powi(self.decimals as i32)).round() as u64
    }

    /// Convert raw on-chain units into a whole-unit amount
    pub fn from_raw(&self, raw: u64) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Base/quote pair traded by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingPair {
    pub base: Token,
    pub quote: Token,
}

impl Default for TradingPair {
    fn default() -> Self {
        Self {
            base: Token::sol(),
            quote: Token::usdc(),
        }
    }
}

impl TradingPair {
    /// Token looked up by symbol, if it belongs to this pair
    pub fn token(&self, symbol: &str) -> Option<&Token> {
        if self.base.symbol == symbol {
            Some(&self.base)
        } else if self.quote.symbol == symbol {
            Some(&self.quote)
        } else {
            None
        }
    }
}

/// Raw event delivered by a price feed source
///
/// `price` is `None` when the oracle has no current price for the instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Option<f64>,
    pub confidence: Option<f64>,
    pub timestamp_ms: i64,
}

/// One recorded oracle tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp_ms: i64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

impl PriceSample {
    pub fn new(price: f64, confidence: f64, timestamp_ms: i64) -> Self {
        Self {
            price,
            timestamp_ms,
            confidence_low: price - confidence,
            confidence_high: price + confidence,
        }
    }
}

/// A price sample with the indicators derived when it was recorded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorPoint {
    pub sample: PriceSample,
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    /// Ratio of this point's EMA to the previous point's EMA
    pub trend: Option<f64>,
}

impl IndicatorPoint {
    pub fn price(&self) -> f64 {
        self.sample.price
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub direction: OrderSide,
    pub reference_price: f64,
}

/// Order handed to the execution collaborator
///
/// `size` is denominated in `from_token` units and is always positive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub from_token: String,
    pub to_token: String,
}

/// Wallet holdings in whole token units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WalletBalance {
    pub base: f64,
    pub quote: f64,
}

impl Default for WalletBalance {
    fn default() -> Self {
        Self {
            base: 10.0,
            quote: 1400.0,
        }
    }
}

/// Order book entry for an executed (or simulated) order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledOrder {
    pub id: Uuid,
    pub order: OrderIntent,
    pub in_amount: f64,
    pub out_amount: f64,
    pub mock: bool,
    pub tx_signature: Option<String>, // Solana transaction signature
    pub filled_at: DateTime<Utc>,
}

impl FilledOrder {
    pub fn new(order: OrderIntent, in_amount: f64, out_amount: f64, mock: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            in_amount,
            out_amount,
            mock,
            tx_signature: None,
            filled_at: Utc::now(),
        }
    }
}
