use crate::models::{OrderIntent, OrderSide, TradingPair};

/// Turns a net signed quantity into a concrete order on the trading pair
#[derive(Debug, Clone)]
pub struct OrderIntentTranslator {
    pair: TradingPair,
}

impl OrderIntentTranslator {
    pub fn new(pair: TradingPair) -> Self {
        Self { pair }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    /// Positive quantities buy the base asset with quote, negative ones sell it
    ///
    /// Zero and non-finite quantities have no order.
    pub fn translate(&self, net_quantity: f64, reference_price: f64) -> Option<OrderIntent> {
        if net_quantity == 0.0 || !net_quantity.is_finite() {
            return None;
        }

        let (side, from, to) = if net_quantity > 0.0 {
            (OrderSide::Buy, &self.pair.quote, &self.pair.base)
        } else {
            (OrderSide::Sell, &self.pair.base, &self.pair.quote)
        };

        Some(OrderIntent {
            side,
            size: net_quantity.abs(),
            price: reference_price,
            from_token: from.symbol.clone(),
            to_token: to.symbol.clone(),
        })
    }
}

impl Default for OrderIntentTranslator {
    fn default() -> Self {
        Self::new(TradingPair::default())
    }
}
