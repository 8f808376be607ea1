//! Core types - Strong typing for safety

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tradeable symbol (e.g., "MSFT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked instrument with its current price and intraday extremes.
///
/// Prices are fixed-point decimals; repeated small mutations never
/// accumulate floating-point drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub symbol: Symbol,
    pub price: Decimal,
    pub day_open: Decimal,
    pub day_low: Decimal,
    pub day_high: Decimal,
    pub last_change: Decimal,
}

impl Stock {
    pub fn new(symbol: Symbol, price: Decimal) -> Self {
        Self {
            symbol,
            price,
            day_open: price,
            day_low: price,
            day_high: price,
            last_change: Decimal::ZERO,
        }
    }

    /// Overwrite the price, tracking the delta and the intraday low/high.
    pub fn set_price(&mut self, value: Decimal) {
        if value == self.price {
            return;
        }
        self.last_change = value - self.price;
        self.price = value;
        if self.price < self.day_low {
            self.day_low = self.price;
        }
        if self.price > self.day_high {
            self.day_high = self.price;
        }
    }

    /// Net change since the day open.
    pub fn change(&self) -> Decimal {
        self.price - self.day_open
    }

    /// Fractional change since the day open, rounded to 4 decimal places.
    /// Zero when the price is zero.
    pub fn percent_change(&self) -> Decimal {
        if self.price.is_zero() {
            return Decimal::ZERO;
        }
        (self.change() / self.price).round_dp(4)
    }
}
