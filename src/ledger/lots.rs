// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::{LedgerStore, TradeDetails, new_id};
use crate::errors::{LedgerError, LedgerResult};
use crate::fees::round_money;
use crate::models::{LotStatus, NewLot, SalePurpose, Stock, StockPatch, TradeSide, Transaction};
use crate::store::DataStore;

/// Removes `sold_qty` shares from a lot. Cost basis shrinks in proportion to
/// the shares left, so the average cost per share is unchanged. A full sale
/// keeps `paid` and `value` as the historical record.
pub fn reduce_lot(
    lot: &Stock,
    sold_qty: Decimal,
    sold_price: Decimal,
    now: DateTime<Utc>,
) -> LedgerResult<Stock> {
    if sold_qty <= Decimal::ZERO || sold_qty > lot.quantity {
        return Err(LedgerError::InvalidQuantity {
            requested: sold_qty,
            available: lot.quantity,
        });
    }
    let mut next = lot.clone();
    next.sold_price = Some(sold_price);
    next.sold_quantity = Some(lot.sold_quantity.unwrap_or(Decimal::ZERO) + sold_qty);

    if sold_qty == lot.quantity {
        next.quantity = Decimal::ZERO;
        next.status = LotStatus::Sold;
        next.sold_date = Some(now);
    } else {
        let remaining = lot.quantity - sold_qty;
        next.paid = lot.paid * remaining / lot.quantity;
        next.quantity = remaining;
        next.value = remaining * lot.current_price;
        next.profit_loss = next.value - next.paid;
        next.status = LotStatus::Partial;
    }
    Ok(next)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotAllocation {
    pub stock_id: String,
    pub quantity: Decimal,
}

/// Open lots with this name, oldest purchase first. Lots without a purchase
/// date sort ahead of dated ones; ties keep insertion order.
pub fn open_lots_by_age<'a>(stocks: &'a [Stock], name: &str) -> Vec<&'a Stock> {
    let mut lots: Vec<&Stock> = stocks
        .iter()
        .filter(|s| s.status.is_open() && s.name_matches(name))
        .collect();
    lots.sort_by_key(|s| s.purchase_date);
    lots
}

/// Plans a FIFO sale across lots without touching them.
pub fn plan_fifo(stocks: &[Stock], name: &str, quantity: Decimal) -> LedgerResult<Vec<LotAllocation>> {
    let lots = open_lots_by_age(stocks, name);
    let available: Decimal = lots.iter().map(|s| s.quantity).sum();
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity {
            requested: quantity,
            available,
        });
    }
    if quantity > available {
        return Err(LedgerError::InsufficientQuantity {
            name: name.to_string(),
            requested: quantity,
            available,
        });
    }

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for lot in lots {
        if remaining.is_zero() {
            break;
        }
        if lot.quantity <= Decimal::ZERO {
            continue;
        }
        let take = remaining.min(lot.quantity);
        plan.push(LotAllocation {
            stock_id: lot.id.clone(),
            quantity: take,
        });
        remaining -= take;
    }
    Ok(plan)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub name: String,
    pub symbol: Option<String>,
    pub lots: usize,
    pub total_quantity: Decimal,
    pub total_paid: Decimal,
    /// Price of the most recently purchased open lot, not a live quote.
    /// Undated lots sort before dated ones, so a position made only of
    /// undated lots takes the price of the last one inserted.
    pub current_price: Decimal,
    pub value: Decimal,
    pub profit_loss: Decimal,
    pub avg_trade_price: Decimal,
}

pub fn aggregate_by_name(stocks: &[Stock], name: &str) -> Position {
    let lots = open_lots_by_age(stocks, name);
    let total_quantity: Decimal = lots.iter().map(|s| s.quantity).sum();
    let total_paid: Decimal = lots.iter().map(|s| s.paid).sum();
    let value: Decimal = lots.iter().map(|s| s.value).sum();
    let newest = lots.last();
    let avg_trade_price = if total_quantity.is_zero() {
        Decimal::ZERO
    } else {
        total_paid / total_quantity
    };
    Position {
        name: newest.map(|s| s.name.clone()).unwrap_or_else(|| name.to_string()),
        symbol: lots.iter().find_map(|s| s.symbol.clone()),
        lots: lots.len(),
        total_quantity,
        total_paid: round_money(total_paid),
        current_price: newest.map(|s| s.current_price).unwrap_or(Decimal::ZERO),
        value: round_money(value),
        profit_loss: round_money(value - total_paid),
        avg_trade_price: round_money(avg_trade_price),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FifoSale {
    pub transactions: Vec<Transaction>,
    pub total_net_amount: Decimal,
    pub total_brokerage: Decimal,
}

impl<S: DataStore> LedgerStore<S> {
    pub fn stock(&self, id: &str) -> Option<&Stock> {
        self.data.stocks.iter().find(|s| s.id == id)
    }

    fn stock_index(&self, id: &str) -> LedgerResult<usize> {
        self.data
            .stocks
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| LedgerError::stock(id))
    }

    /// Opens a lot and records the matching buy.
    pub fn add_stock(&mut self, lot: NewLot) -> LedgerResult<(Stock, Transaction)> {
        let stock = self.open_lot(lot)?;
        let txn = self.append_trade(
            TradeSide::Buy,
            &stock.id,
            stock.quantity,
            stock.trade_price,
            TradeDetails::default(),
        )?;
        self.persist()?;
        Ok((stock, txn))
    }

    pub(crate) fn open_lot(&mut self, lot: NewLot) -> LedgerResult<Stock> {
        if lot.quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                requested: lot.quantity,
                available: Decimal::ZERO,
            });
        }
        if lot.trade_price < Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(lot.trade_price));
        }
        let paid = lot.paid.unwrap_or(lot.quantity * lot.trade_price);
        let mut stock = Stock {
            id: new_id("stock"),
            name: lot.name.trim().to_string(),
            symbol: lot
                .symbol
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
            paid,
            trade_price: lot.trade_price,
            quantity: lot.quantity,
            current_price: Decimal::ZERO,
            sold_price: None,
            sold_quantity: None,
            value: Decimal::ZERO,
            profit_loss: Decimal::ZERO,
            purchase_date: Some(lot.purchase_date.unwrap_or_else(Utc::now)),
            sold_date: None,
            status: LotStatus::Active,
        };
        stock.mark_to(lot.current_price.unwrap_or(lot.trade_price));
        info!(id = %stock.id, name = %stock.name, qty = %stock.quantity, "lot opened");
        self.data.stocks.push(stock.clone());
        Ok(stock)
    }

    pub fn update_stock(&mut self, id: &str, patch: StockPatch) -> LedgerResult<Stock> {
        if let Some(price) = patch.current_price.filter(|p| *p < Decimal::ZERO) {
            return Err(LedgerError::InvalidPrice(price));
        }
        let idx = self.stock_index(id)?;
        let lot = &mut self.data.stocks[idx];
        if let Some(name) = patch.name {
            lot.name = name.trim().to_string();
        }
        if let Some(symbol) = patch.symbol {
            let symbol = symbol.trim().to_uppercase();
            lot.symbol = (!symbol.is_empty()).then_some(symbol);
        }
        if let Some(date) = patch.purchase_date {
            lot.purchase_date = Some(date);
        }
        if let Some(price) = patch.current_price {
            lot.mark_to(price);
        }
        let updated = lot.clone();
        self.persist()?;
        Ok(updated)
    }

    /// Sells from one lot and records the sale. Nothing is mutated on error.
    pub(crate) fn sell_lot(
        &mut self,
        stock_id: &str,
        quantity: Decimal,
        price: Decimal,
        details: TradeDetails,
    ) -> LedgerResult<Transaction> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }
        let idx = self.stock_index(stock_id)?;
        let now = self.next_timestamp();
        let reduced = reduce_lot(&self.data.stocks[idx], quantity, price, now)?;
        let txn = self.append_trade(TradeSide::Sell, stock_id, quantity, price, details)?;
        self.data.stocks[idx] = reduced;
        info!(
            stock = stock_id,
            qty = %quantity,
            price = %price,
            status = %self.data.stocks[idx].status,
            "lot reduced"
        );
        Ok(txn)
    }

    pub fn sell_stock(
        &mut self,
        stock_id: &str,
        quantity: Decimal,
        price: Decimal,
        purpose: SalePurpose,
        notes: Option<String>,
    ) -> LedgerResult<Transaction> {
        let details = TradeDetails {
            purpose: Some(purpose),
            notes,
            ..Default::default()
        };
        let txn = self.sell_lot(stock_id, quantity, price, details)?;
        self.persist()?;
        Ok(txn)
    }

    /// FIFO sale across every open lot with this name. The full allocation is
    /// planned before any lot is touched, and the commit is all-or-nothing.
    pub fn sell_by_name(
        &mut self,
        name: &str,
        quantity: Decimal,
        price: Decimal,
        purpose: SalePurpose,
        notes: Option<String>,
    ) -> LedgerResult<FifoSale> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice(price));
        }
        let plan = plan_fifo(&self.data.stocks, name, quantity)?;
        let sale = self.commit_fifo(name, quantity, &plan, price, purpose, notes)?;
        self.persist()?;
        Ok(sale)
    }

    /// Executes a FIFO plan. If the plan no longer covers `quantity` or any
    /// lot rejects its share, every lot and the log are restored.
    fn commit_fifo(
        &mut self,
        name: &str,
        quantity: Decimal,
        plan: &[LotAllocation],
        price: Decimal,
        purpose: SalePurpose,
        notes: Option<String>,
    ) -> LedgerResult<FifoSale> {
        let planned: Decimal = plan.iter().map(|a| a.quantity).sum();
        if planned < quantity {
            return Err(LedgerError::ExecutionIncomplete {
                name: name.to_string(),
                remaining: quantity - planned,
            });
        }

        let stocks_before = self.data.stocks.clone();
        let txns_before = self.data.transactions.len();
        let mut sale = FifoSale {
            transactions: Vec::with_capacity(plan.len()),
            total_net_amount: Decimal::ZERO,
            total_brokerage: Decimal::ZERO,
        };
        for alloc in plan {
            let details = TradeDetails {
                purpose: Some(purpose),
                notes: notes.clone(),
                ..Default::default()
            };
            match self.sell_lot(&alloc.stock_id, alloc.quantity, price, details) {
                Ok(txn) => {
                    sale.total_net_amount += txn.net_amount;
                    sale.total_brokerage += txn.brokerage;
                    sale.transactions.push(txn);
                }
                Err(e) => {
                    warn!(name, stock = %alloc.stock_id, error = %e, "FIFO sale rolled back");
                    self.data.stocks = stocks_before;
                    self.data.transactions.truncate(txns_before);
                    return Err(e);
                }
            }
        }
        info!(name, qty = %quantity, lots = plan.len(), "FIFO sale committed");
        Ok(sale)
    }

    pub fn aggregate_by_name(&self, name: &str) -> Position {
        aggregate_by_name(&self.data.stocks, name)
    }

    /// One position per distinct open lot name, in first-seen order.
    pub fn positions(&self) -> Vec<Position> {
        let mut names: Vec<String> = Vec::new();
        for s in self.data.stocks.iter().filter(|s| s.status.is_open()) {
            if !names.iter().any(|n| s.name_matches(n)) {
                names.push(s.name.clone());
            }
        }
        names
            .iter()
            .map(|n| aggregate_by_name(&self.data.stocks, n))
            .collect()
    }

    /// Opens a lot paid for by an earlier sale and links the buy to it.
    pub fn buy_with_proceeds(
        &mut self,
        sell_txn_id: &str,
        lot: NewLot,
    ) -> LedgerResult<(Stock, Transaction)> {
        let funding = self
            .data
            .transactions
            .iter()
            .find(|t| t.id == sell_txn_id)
            .ok_or_else(|| LedgerError::transaction(sell_txn_id))?;
        if funding.side != TradeSide::Sell || funding.is_reverted() {
            return Err(LedgerError::UnsupportedOperation(format!(
                "transaction '{}' is not an active sell",
                sell_txn_id
            )));
        }
        let stock = self.open_lot(lot)?;
        let txn = self.append_trade(
            TradeSide::Buy,
            &stock.id,
            stock.quantity,
            stock.trade_price,
            TradeDetails {
                purpose: Some(SalePurpose::Reinvest),
                linked_buy_id: Some(sell_txn_id.to_string()),
                notes: Some("Purchased using proceeds from stock sale".into()),
                ..Default::default()
            },
        )?;
        self.persist()?;
        Ok((stock, txn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppData;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn lot(id: &str, qty: &str, paid: &str, day: u32) -> Stock {
        let quantity = d(qty);
        let mut s = Stock {
            id: id.into(),
            name: "Ather Energy".into(),
            symbol: Some("ATHERENERGY".into()),
            paid: d(paid),
            trade_price: d(paid) / quantity,
            quantity,
            current_price: Decimal::ZERO,
            sold_price: None,
            sold_quantity: None,
            value: Decimal::ZERO,
            profit_loss: Decimal::ZERO,
            purchase_date: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            sold_date: None,
            status: LotStatus::Active,
        };
        s.mark_to(d("120"));
        s
    }

    #[test]
    fn partial_reduce_keeps_average_cost() {
        let before = lot("s1", "30", "3000", 1);
        let after = reduce_lot(&before, d("10"), d("130"), Utc::now()).unwrap();
        assert_eq!(after.status, LotStatus::Partial);
        assert_eq!(after.quantity, d("20"));
        assert_eq!(after.paid, d("2000"));
        assert_eq!(after.value, d("2400"));
        assert_eq!(after.profit_loss, d("400"));
        assert_eq!(after.sold_quantity, Some(d("10")));
        assert_eq!(after.avg_cost(), before.avg_cost());
    }

    #[test]
    fn full_reduce_keeps_historical_cost() {
        let before = lot("s1", "30", "3000", 1);
        let after = reduce_lot(&before, d("30"), d("130"), Utc::now()).unwrap();
        assert_eq!(after.status, LotStatus::Sold);
        assert!(after.quantity.is_zero());
        assert_eq!(after.paid, d("3000"));
        assert_eq!(after.value, before.value);
        assert!(after.sold_date.is_some());
        assert_eq!(after.sold_price, Some(d("130")));
    }

    #[test]
    fn reduce_rejects_zero_and_oversell() {
        let before = lot("s1", "30", "3000", 1);
        for q in ["0", "-1", "30.5"] {
            let err = reduce_lot(&before, d(q), d("130"), Utc::now()).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidQuantity { .. }));
        }
    }

    #[test]
    fn split_then_liquidate_matches_single_sale() {
        let before = lot("s1", "30", "3000", 1);
        let first = reduce_lot(&before, d("12"), d("110"), Utc::now()).unwrap();
        let cost_first = before.paid - first.paid;
        let last = reduce_lot(&first, d("18"), d("140"), Utc::now()).unwrap();
        let cost_last = first.paid;
        assert_eq!(last.status, LotStatus::Sold);
        assert_eq!(last.sold_quantity, Some(d("30")));

        let gain_split = (d("12") * d("110") - cost_first) + (d("18") * d("140") - cost_last);
        let blended = (d("12") * d("110") + d("18") * d("140")) / d("30");
        let gain_single = d("30") * blended - before.paid;
        assert!((gain_split - gain_single).abs() < d("0.01"));
    }

    #[test]
    fn fifo_plan_consumes_oldest_lot_first() {
        let stocks = vec![
            lot("newest", "10", "1000", 20),
            lot("oldest", "10", "1000", 1),
            lot("middle", "10", "1000", 10),
        ];
        let plan = plan_fifo(&stocks, "ather energy", d("15")).unwrap();
        assert_eq!(
            plan,
            vec![
                LotAllocation {
                    stock_id: "oldest".into(),
                    quantity: d("10")
                },
                LotAllocation {
                    stock_id: "middle".into(),
                    quantity: d("5")
                },
            ]
        );
    }

    #[test]
    fn fifo_plan_skips_sold_lots_and_reports_shortfall() {
        let mut sold = lot("sold", "10", "1000", 1);
        sold.quantity = Decimal::ZERO;
        sold.status = LotStatus::Sold;
        let stocks = vec![sold, lot("open", "10", "1000", 2)];
        let err = plan_fifo(&stocks, "Ather Energy", d("11")).unwrap_err();
        match err {
            LedgerError::InsufficientQuantity {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, d("11"));
                assert_eq!(available, d("10"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn aggregate_uses_newest_lot_price() {
        let mut stocks = vec![lot("a", "10", "1000", 1), lot("b", "30", "3600", 5)];
        stocks[1].mark_to(d("125"));
        let pos = aggregate_by_name(&stocks, "Ather Energy");
        assert_eq!(pos.lots, 2);
        assert_eq!(pos.total_quantity, d("40"));
        assert_eq!(pos.total_paid, d("4600"));
        assert_eq!(pos.current_price, d("125"));
        assert_eq!(pos.value, d("4950"));
        assert_eq!(pos.profit_loss, d("350"));
        assert_eq!(pos.avg_trade_price, d("115"));
    }

    #[test]
    fn aggregate_of_undated_lots_uses_last_inserted_price() {
        let mut stocks = vec![lot("a", "10", "1000", 1), lot("b", "10", "1000", 2)];
        for s in &mut stocks {
            s.purchase_date = None;
        }
        stocks[0].mark_to(d("130"));
        stocks[1].mark_to(d("110"));
        assert_eq!(aggregate_by_name(&stocks, "Ather Energy").current_price, d("110"));
    }

    fn ledger_with(stocks: Vec<Stock>, store: &MemoryStore) -> LedgerStore<&MemoryStore> {
        let data = AppData {
            stocks,
            ..Default::default()
        };
        LedgerStore::with_data(data, store)
    }

    #[test]
    fn stale_fifo_plan_rolls_back_every_lot() {
        let store = MemoryStore::new();
        let mut ledger = ledger_with(
            vec![lot("s1", "10", "1000", 1), lot("s2", "10", "1000", 2)],
            &store,
        );
        let plan = plan_fifo(&ledger.data().stocks, "Ather Energy", d("15")).unwrap();

        ledger.data.stocks[1].quantity = Decimal::ZERO;
        let stocks_before = ledger.data().stocks.clone();
        let txns_before = ledger.data().transactions.len();

        let err = ledger
            .commit_fifo("Ather Energy", d("15"), &plan, d("130"), SalePurpose::Other, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity { .. }));
        assert_eq!(ledger.data().stocks, stocks_before);
        assert_eq!(ledger.data().stocks[0].quantity, d("10"));
        assert_eq!(ledger.data().transactions.len(), txns_before);
    }

    #[test]
    fn short_fifo_plan_is_incomplete() {
        let store = MemoryStore::new();
        let mut ledger = ledger_with(vec![lot("s1", "10", "1000", 1)], &store);
        let plan = vec![LotAllocation {
            stock_id: "s1".into(),
            quantity: d("4"),
        }];
        let err = ledger
            .commit_fifo("Ather Energy", d("6"), &plan, d("130"), SalePurpose::Other, None)
            .unwrap_err();
        match err {
            LedgerError::ExecutionIncomplete { remaining, .. } => assert_eq!(remaining, d("2")),
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(ledger.data().stocks[0].quantity, d("10"));
        assert!(ledger.data().transactions.is_empty());
    }

    #[test]
    fn aggregate_of_unknown_name_is_empty() {
        let pos = aggregate_by_name(&[], "Nothing");
        assert!(pos.total_quantity.is_zero());
        assert!(pos.avg_trade_price.is_zero());
        assert_eq!(pos.lots, 0);
    }
}
