//! Instrument store - shared current state of every tracked stock.
//!
//! Seeded once at construction; no insert or remove afterward. The tick
//! scheduler is the single writer (cycles never overlap), while snapshot
//! queries and the transport read concurrently. A reader overlapping a
//! cycle may see a mix of pre- and post-mutation prices across stocks;
//! there is no cross-stock atomicity.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::core::{Error, Result, Stock, Symbol};

pub struct StockStore {
    stocks: RwLock<HashMap<Symbol, Stock>>,
}

impl StockStore {
    /// Build the store from the seed set. Later seeds win on duplicate
    /// symbols; config validation rejects duplicates before we get here.
    pub fn new(seed: impl IntoIterator<Item = Stock>) -> Self {
        let stocks = seed
            .into_iter()
            .map(|stock| (stock.symbol.clone(), stock))
            .collect();
        Self {
            stocks: RwLock::new(stocks),
        }
    }

    /// Snapshot all stocks. Safe to call while a cycle is in progress.
    pub fn get_all(&self) -> Vec<Stock> {
        self.stocks.read().values().cloned().collect()
    }

    pub fn get(&self, symbol: &Symbol) -> Result<Stock> {
        self.stocks
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))
    }

    /// Overwrite the stored price for `symbol`, returning the updated stock.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) -> Result<Stock> {
        let mut stocks = self.stocks.write();
        let stock = stocks
            .get_mut(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))?;
        stock.set_price(price);
        Ok(stock.clone())
    }

    /// Symbols currently tracked, in arbitrary order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.stocks.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.stocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.read().is_empty()
    }
}
