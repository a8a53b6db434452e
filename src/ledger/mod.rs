// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The ledger aggregate and every operation that mutates it.
//!
//! `LedgerStore` owns the single `AppData` document. Each mutating method
//! validates first, applies the change in memory, then persists the whole
//! document through its `DataStore`. A failed save is returned to the caller
//! but the in-memory change is kept.

pub mod loans;
pub mod lots;
pub mod transactions;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{LedgerError, LedgerResult};
use crate::fees::round_money;
use crate::models::{AppData, BrokerageConfig, BrokerageConfigPatch, StockPriceData};
use crate::quotes::QuoteProvider;
use crate::store::DataStore;

pub use loans::{
    EmiSummary, LotSale, UpcomingEmi, UpcomingEmiItem, compute_upcoming_emi, due_date,
};
pub use lots::{FifoSale, LotAllocation, Position, aggregate_by_name, plan_fifo, reduce_lot};
pub use transactions::TradeDetails;

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
}

pub struct LedgerStore<S: DataStore> {
    data: AppData,
    store: S,
}

impl<S: DataStore> LedgerStore<S> {
    /// Loads the document, or initialises and persists a default one.
    pub fn open(store: S) -> LedgerResult<Self> {
        match store.load()? {
            Some(data) => Ok(Self { data, store }),
            None => {
                info!("no data document found, initialising a new ledger");
                let mut ledger = Self {
                    data: AppData::default(),
                    store,
                };
                ledger.persist()?;
                Ok(ledger)
            }
        }
    }

    /// Wraps an existing document without touching the store.
    pub fn with_data(data: AppData, store: S) -> Self {
        Self { data, store }
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_data(self) -> AppData {
        self.data
    }

    pub(crate) fn persist(&mut self) -> LedgerResult<()> {
        self.data.last_updated = Utc::now();
        if let Err(e) = self.store.save(&self.data) {
            warn!(error = %e, "save failed; in-memory ledger is ahead of storage");
            return Err(LedgerError::Persistence(e));
        }
        Ok(())
    }

    /// Replaces the whole document, e.g. from a backup.
    pub fn replace_data(&mut self, data: AppData) -> LedgerResult<()> {
        self.data = data;
        info!(
            stocks = self.data.stocks.len(),
            loans = self.data.loans.len(),
            transactions = self.data.transactions.len(),
            "ledger replaced"
        );
        self.persist()
    }

    pub fn brokerage_config(&self) -> &BrokerageConfig {
        &self.data.brokerage_config
    }

    pub fn update_brokerage_config(
        &mut self,
        patch: &BrokerageConfigPatch,
    ) -> LedgerResult<BrokerageConfig> {
        patch.apply_to(&mut self.data.brokerage_config);
        info!("brokerage config updated");
        self.persist()?;
        Ok(self.data.brokerage_config.clone())
    }

    pub fn reset_brokerage_config(&mut self) -> LedgerResult<BrokerageConfig> {
        self.data.brokerage_config = BrokerageConfig::default();
        info!("brokerage config reset to defaults");
        self.persist()?;
        Ok(self.data.brokerage_config.clone())
    }

    /// Totals over open (active or partial) lots.
    pub fn portfolio_summary(&self) -> PortfolioSummary {
        let (invested, value) = self
            .data
            .stocks
            .iter()
            .filter(|s| s.status.is_open())
            .fold((Decimal::ZERO, Decimal::ZERO), |(p, v), s| {
                (p + s.paid, v + s.value)
            });
        let profit_loss = value - invested;
        let pct = if invested > Decimal::ZERO {
            profit_loss / invested * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        PortfolioSummary {
            total_invested: round_money(invested),
            current_value: round_money(value),
            profit_loss: round_money(profit_loss),
            profit_loss_percent: round_money(pct),
        }
    }

    /// Marks every open lot carrying `symbol` to the quote and caches it.
    pub fn apply_quote(&mut self, symbol: &str, quote: &StockPriceData) -> LedgerResult<usize> {
        let updated = self.mark_symbol(symbol, quote);
        self.persist()?;
        Ok(updated)
    }

    fn mark_symbol(&mut self, symbol: &str, quote: &StockPriceData) -> usize {
        let mut updated = 0;
        for lot in self.data.stocks.iter_mut().filter(|s| {
            s.status.is_open()
                && s.symbol
                    .as_deref()
                    .is_some_and(|sym| sym.eq_ignore_ascii_case(symbol))
        }) {
            lot.mark_to(quote.last_price);
            updated += 1;
        }
        self.data
            .price_cache
            .insert(symbol.to_string(), quote.clone());
        info!(symbol, price = %quote.last_price, lots = updated, "price applied");
        updated
    }

    /// Copies a manually entered price onto every open lot with the same name.
    pub fn sync_price_by_name(&mut self, name: &str, price: Decimal) -> LedgerResult<usize> {
        if price < Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }
        let mut updated = 0;
        for lot in self
            .data
            .stocks
            .iter_mut()
            .filter(|s| s.status.is_open() && s.name_matches(name))
        {
            lot.mark_to(price);
            updated += 1;
        }
        if updated == 0 {
            return Err(LedgerError::NotFound {
                kind: "Open lot named",
                id: name.to_string(),
            });
        }
        self.persist()?;
        Ok(updated)
    }

    /// Fetches quotes for every distinct symbol among open lots.
    pub fn refresh_prices(&mut self, provider: &dyn QuoteProvider) -> LedgerResult<usize> {
        let mut symbols: Vec<String> = self
            .data
            .stocks
            .iter()
            .filter(|s| s.status.is_open())
            .filter_map(|s| s.symbol.clone())
            .filter(|s| !s.trim().is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        if symbols.is_empty() {
            return Ok(0);
        }
        let quotes = provider.fetch_many(&symbols);
        let mut updated = 0;
        for (symbol, quote) in &quotes {
            updated += self.mark_symbol(symbol, quote);
        }
        if quotes.len() < symbols.len() {
            warn!(
                requested = symbols.len(),
                received = quotes.len(),
                "some quotes could not be fetched"
            );
        }
        if !quotes.is_empty() {
            self.persist()?;
        }
        Ok(updated)
    }

    pub(crate) fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.data.transactions.iter().map(|t| t.date).max() {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}
