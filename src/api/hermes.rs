use crate::error::FeedError;
use reqwest::Client;
use serde::Deserialize;

// Pyth Hermes price service
// Docs: https://hermes.pyth.network/docs
const HERMES_API_BASE: &str = "https://hermes.pyth.network";

/// Pyth price feed id for Crypto.SOL/USD
pub const SOL_USD_FEED_ID: &str = "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";
pub const SOL_USD_SYMBOL: &str = "Crypto.SOL/USD";

/// Client for the Pyth Hermes REST API
#[derive(Clone)]
pub struct HermesClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestPriceResponse {
    #[serde(default)]
    parsed: Vec<ParsedPriceUpdate>,
}

#[derive(Debug, Deserialize)]
struct ParsedPriceUpdate {
    id: String,
    price: RawPrice,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

/// Decoded oracle price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OraclePrice {
    pub price: f64,
    pub confidence: f64,
    pub publish_time: i64, // Unix seconds
}

impl HermesClient {
    pub fn new() -> Self {
        Self::with_base_url(HERMES_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the latest price for a feed
    ///
    /// Returns `Ok(None)` when the feed has no current price (missing entry or a
    /// zero aggregate price).
    pub async fn latest_price(&self, feed_id: &str) -> Result<Option<OraclePrice>, FeedError> {
        let url = format!("{}/v2/updates/price/latest", self.base_url);

        let response: LatestPriceResponse = self
            .client
            .get(&url)
            .query(&[("ids[]", feed_id), ("parsed", "true")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let wanted = feed_id.trim_start_matches("0x");
        let Some(update) = response
            .parsed
            .into_iter()
            .find(|u| u.id.trim_start_matches("0x").eq_ignore_ascii_case(wanted))
        else {
            return Ok(None);
        };

        decode_price(&update.price)
    }
}

impl Default for HermesClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Pyth prices are integers scaled by `10^expo`
fn decode_price(raw: &RawPrice) -> Result<Option<OraclePrice>, FeedError> {
    let mantissa: i64 = raw
        .price
        .parse()
        .map_err(|_| FeedError::Malformed(format!("price {:?}", raw.price)))?;
    let conf: u64 = raw
        .conf
        .parse()
        .map_err(|_| FeedError::Malformed(format!("conf {:?}", raw.conf)))?;

    if mantissa == 0 {
        return Ok(None);
    }

    let scale = 10f64.powi(raw.expo);
    Ok(Some(OraclePrice {
        price: mantissa as f64 * scale,
        confidence: conf as f64 * scale,
        publish_time: raw.publish_time,
    }))
}
