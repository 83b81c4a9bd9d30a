use crate::models::WalletBalance;
use serde::{Deserialize, Serialize};

/// Percent change of the portfolio against the session baseline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PercentChange {
    Computable(f64),
    /// Current worth is zero or the ratio is not a finite number
    NotComputable,
}

impl PercentChange {
    pub fn value(&self) -> Option<f64> {
        match self {
            PercentChange::Computable(v) => Some(*v),
            PercentChange::NotComputable => None,
        }
    }
}

impl std::fmt::Display for PercentChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PercentChange::Computable(v) => write!(f, "{:+.6}%", v),
            PercentChange::NotComputable => write!(f, "n/a"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Worth {
    pub current: f64,
    pub change: PercentChange,
}

/// Values holdings at the latest price against a baseline fixed at session start
#[derive(Debug, Clone)]
pub struct WorthTracker {
    initial: f64,
}

impl WorthTracker {
    pub fn new(initial: f64) -> Self {
        Self { initial }
    }

    /// Capture the baseline from the opening balance and price
    pub fn from_balance(balance: &WalletBalance, price: f64) -> Self {
        Self::new(current_worth(balance, price))
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    /// Current worth is `base * price + quote`; change is `initial / current * 100 - 100`
    pub fn recompute(&self, balance: &WalletBalance, latest_price: f64) -> Worth {
        let current = current_worth(balance, latest_price);

        let change = if current == 0.0 {
            PercentChange::NotComputable
        } else {
            let pct = (self.initial / current) * 100.0 - 100.0;
            if pct.is_finite() {
                PercentChange::Computable(pct)
            } else {
                PercentChange::NotComputable
            }
        };

        Worth { current, change }
    }
}

fn current_worth(balance: &WalletBalance, price: f64) -> f64 {
    balance.base * price + balance.quote
}
