// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use super::{LedgerStore, new_id};
use crate::errors::{LedgerError, LedgerResult};
use crate::fees::{compute_net_amount, round_money};
use crate::models::{LotStatus, SalePurpose, Stock, TradeSide, Transaction};
use crate::store::DataStore;

/// Optional context attached to a trade record.
#[derive(Debug, Clone, Default)]
pub struct TradeDetails {
    pub loan_id: Option<String>,
    pub emi_month: Option<u32>,
    pub purpose: Option<SalePurpose>,
    pub linked_buy_id: Option<String>,
    pub notes: Option<String>,
}

impl<S: DataStore> LedgerStore<S> {
    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.data.transactions.iter().find(|t| t.id == id)
    }

    /// Builds and appends a trade record against the lot's current state.
    /// Sells carry the lot's average cost so realized P&L is fixed at sale time.
    pub(crate) fn append_trade(
        &mut self,
        side: TradeSide,
        stock_id: &str,
        quantity: Decimal,
        price: Decimal,
        details: TradeDetails,
    ) -> LedgerResult<Transaction> {
        let stock = self
            .stock(stock_id)
            .ok_or_else(|| LedgerError::stock(stock_id))?;
        let stock_name = stock.name.clone();
        let cost_per_share = match side {
            TradeSide::Sell => stock.avg_cost().unwrap_or(price),
            TradeSide::Buy => price,
        };

        let amounts = compute_net_amount(quantity, price, &self.data.brokerage_config, side);
        let cost_total = cost_per_share * quantity;
        let (realized_pnl, buy_amount, sell_amount) = match side {
            TradeSide::Sell => (
                round_money(amounts.net_amount - cost_total),
                Some(round_money(cost_total)),
                Some(amounts.net_amount),
            ),
            TradeSide::Buy => (Decimal::ZERO, Some(amounts.net_amount), None),
        };

        let txn = Transaction {
            id: new_id("txn"),
            side,
            stock_id: stock_id.to_string(),
            stock_name,
            quantity,
            price,
            total_amount: amounts.gross_amount,
            brokerage: amounts.brokerage_total,
            net_amount: amounts.net_amount,
            date: self.next_timestamp(),
            loan_id: details.loan_id,
            emi_month: details.emi_month,
            purpose: details.purpose,
            linked_buy_id: details.linked_buy_id,
            notes: details.notes,
            cost_per_share: Some(cost_per_share),
            cost_total: Some(cost_total),
            realized_pnl: Some(realized_pnl),
            buy_amount,
            sell_amount,
            reverted: None,
            reverted_at: None,
        };
        self.data.transactions.push(txn.clone());
        Ok(txn)
    }

    /// Appends a trade record without changing any lot.
    pub fn record_trade(
        &mut self,
        side: TradeSide,
        stock_id: &str,
        quantity: Decimal,
        price: Decimal,
        details: TradeDetails,
    ) -> LedgerResult<Transaction> {
        let txn = self.append_trade(side, stock_id, quantity, price, details)?;
        info!(id = %txn.id, side = %side, stock = stock_id, "trade recorded");
        self.persist()?;
        Ok(txn)
    }

    /// Puts the shares of a sell back into its lot and flags the record.
    /// The cost basis returned to the lot is the `costTotal` captured at sale
    /// time; sells recorded before that field existed fall back to the lot's
    /// current average cost. A sell whose shares never left the lot, such as
    /// one written with `record_trade`, is rejected.
    pub fn revert_transaction(&mut self, id: &str) -> LedgerResult<Stock> {
        let t_idx = self
            .data
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LedgerError::transaction(id))?;
        let txn = &self.data.transactions[t_idx];
        if txn.is_reverted() {
            return Err(LedgerError::AlreadyReverted(id.to_string()));
        }
        if txn.side != TradeSide::Sell {
            return Err(LedgerError::UnsupportedOperation(format!(
                "only sell transactions can be reverted, '{}' is a {}",
                id, txn.side
            )));
        }
        let s_idx = self
            .data
            .stocks
            .iter()
            .position(|s| s.id == txn.stock_id)
            .ok_or_else(|| LedgerError::stock(&txn.stock_id))?;
        let sold = self.data.stocks[s_idx]
            .sold_quantity
            .unwrap_or(Decimal::ZERO);
        if sold < txn.quantity {
            return Err(LedgerError::UnsupportedOperation(format!(
                "'{}' sold {} but lot '{}' only records {} sold",
                id, txn.quantity, txn.stock_id, sold
            )));
        }

        let restored = restore_lot(&self.data.stocks[s_idx], txn);
        self.data.stocks[s_idx] = restored.clone();

        let txn = &mut self.data.transactions[t_idx];
        txn.reverted = Some(true);
        txn.reverted_at = Some(Utc::now());
        info!(id, stock = %restored.id, qty = %restored.quantity, "sell reverted");

        self.persist()?;
        Ok(restored)
    }

    /// Drops a record from the log. Lots are left as they are; revert first
    /// to undo the trade itself. Returns whether a record was removed.
    pub fn delete_transaction(&mut self, id: &str) -> LedgerResult<bool> {
        let before = self.data.transactions.len();
        self.data.transactions.retain(|t| t.id != id);
        if self.data.transactions.len() == before {
            return Ok(false);
        }
        info!(id, "transaction deleted");
        self.persist()?;
        Ok(true)
    }
}

fn restore_lot(lot: &Stock, txn: &Transaction) -> Stock {
    let mut next = lot.clone();
    // A fully sold lot still carries its last cost as history; start from zero.
    let base_paid = if lot.quantity.is_zero() {
        Decimal::ZERO
    } else {
        lot.paid
    };
    let returned_cost = match txn.cost_total {
        Some(cost) => cost,
        None => {
            let avg = lot.avg_cost().unwrap_or(txn.price);
            avg * txn.quantity
        }
    };
    next.quantity = lot.quantity + txn.quantity;
    next.paid = base_paid + returned_cost;

    let still_sold = lot.sold_quantity.unwrap_or(Decimal::ZERO) - txn.quantity;
    if still_sold.is_zero() {
        next.sold_quantity = None;
        next.sold_price = None;
        next.status = LotStatus::Active;
    } else {
        next.sold_quantity = Some(still_sold);
        next.status = LotStatus::Partial;
    }
    next.sold_date = None;
    next.mark_to(lot.current_price);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrokerageConfig, NewLot};
    use crate::store::MemoryStore;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn zero_fee() -> BrokerageConfig {
        BrokerageConfig {
            buy_rate: Decimal::ZERO,
            sell_rate: Decimal::ZERO,
            min_charge: Decimal::ZERO,
            max_charge: Decimal::ZERO,
            stt_buy: Decimal::ZERO,
            stt_sell: Decimal::ZERO,
            exchange_charges: Decimal::ZERO,
            sebi_charges: Decimal::ZERO,
            ipft_charges: None,
            gst: Decimal::ZERO,
            stamp_duty_buy: Decimal::ZERO,
            stamp_duty_sell: Decimal::ZERO,
        }
    }

    fn ledger_with_lot(store: &MemoryStore) -> (LedgerStore<&MemoryStore>, String) {
        let data = crate::models::AppData {
            brokerage_config: zero_fee(),
            ..Default::default()
        };
        let mut ledger = LedgerStore::with_data(data, store);
        let (stock, _) = ledger
            .add_stock(NewLot {
                name: "ABC".into(),
                symbol: None,
                quantity: d("30"),
                trade_price: d("100"),
                current_price: None,
                paid: None,
                purchase_date: None,
            })
            .unwrap();
        (ledger, stock.id)
    }

    #[test]
    fn sell_records_cost_and_realized_pnl() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let txn = ledger
            .sell_stock(&id, d("10"), d("130"), SalePurpose::Profit, None)
            .unwrap();
        assert_eq!(txn.cost_per_share, Some(d("100")));
        assert_eq!(txn.cost_total, Some(d("1000")));
        assert_eq!(txn.realized_pnl, Some(d("300")));
        assert_eq!(txn.net_amount, d("1300"));
    }

    #[test]
    fn buy_records_zero_realized_pnl() {
        let store = MemoryStore::new();
        let (ledger, _) = ledger_with_lot(&store);
        let buy = &ledger.data().transactions[0];
        assert_eq!(buy.side, TradeSide::Buy);
        assert_eq!(buy.realized_pnl, Some(Decimal::ZERO));
        assert_eq!(buy.cost_per_share, Some(d("100")));
    }

    #[test]
    fn revert_restores_partial_sale_exactly() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let before = ledger.stock(&id).unwrap().clone();
        let txn = ledger
            .sell_stock(&id, d("10"), d("130"), SalePurpose::Other, None)
            .unwrap();
        let restored = ledger.revert_transaction(&txn.id).unwrap();
        assert_eq!(restored.quantity, before.quantity);
        assert_eq!(restored.paid, before.paid);
        assert_eq!(restored.status, LotStatus::Active);
        assert!(restored.sold_quantity.is_none());
        assert_eq!(ledger.transaction(&txn.id).unwrap().reverted, Some(true));
        assert!(ledger.transaction(&txn.id).unwrap().reverted_at.is_some());
    }

    #[test]
    fn reverting_one_of_two_sells_leaves_lot_partial() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let first = ledger
            .sell_stock(&id, d("10"), d("130"), SalePurpose::Other, None)
            .unwrap();
        ledger
            .sell_stock(&id, d("20"), d("90"), SalePurpose::Other, None)
            .unwrap();
        assert_eq!(ledger.stock(&id).unwrap().status, LotStatus::Sold);

        let restored = ledger.revert_transaction(&first.id).unwrap();
        assert_eq!(restored.quantity, d("10"));
        assert_eq!(restored.paid, d("1000"));
        assert_eq!(restored.status, LotStatus::Partial);
        assert_eq!(restored.sold_quantity, Some(d("20")));
    }

    #[test]
    fn revert_legacy_sell_uses_current_average_cost() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let txn = ledger
            .sell_stock(&id, d("10"), d("130"), SalePurpose::Other, None)
            .unwrap();
        ledger.data.transactions.last_mut().unwrap().cost_total = None;
        let restored = ledger.revert_transaction(&txn.id).unwrap();
        assert_eq!(restored.paid, d("3000"));
    }

    #[test]
    fn revert_guards_against_misuse() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let buy_id = ledger.data().transactions[0].id.clone();
        assert!(matches!(
            ledger.revert_transaction(&buy_id),
            Err(LedgerError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            ledger.revert_transaction("txn-missing"),
            Err(LedgerError::NotFound { .. })
        ));

        let sell = ledger
            .sell_stock(&id, d("5"), d("120"), SalePurpose::Other, None)
            .unwrap();
        ledger.revert_transaction(&sell.id).unwrap();
        let lot_after_first = ledger.stock(&id).unwrap().clone();
        assert!(matches!(
            ledger.revert_transaction(&sell.id),
            Err(LedgerError::AlreadyReverted(_))
        ));
        assert_eq!(ledger.stock(&id).unwrap(), &lot_after_first);
    }

    #[test]
    fn delete_does_not_touch_lots() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let sell = ledger
            .sell_stock(&id, d("5"), d("120"), SalePurpose::Other, None)
            .unwrap();
        let lot = ledger.stock(&id).unwrap().clone();
        assert!(ledger.delete_transaction(&sell.id).unwrap());
        assert!(!ledger.delete_transaction(&sell.id).unwrap());
        assert_eq!(ledger.stock(&id).unwrap(), &lot);
        assert_eq!(lot.quantity, d("25"));
    }

    #[test]
    fn record_trade_leaves_lot_unchanged() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let saves = store.save_count();
        let txn = ledger
            .record_trade(TradeSide::Sell, &id, d("3"), d("150"), TradeDetails::default())
            .unwrap();
        assert_eq!(txn.realized_pnl, Some(d("150")));
        assert_eq!(ledger.stock(&id).unwrap().quantity, d("30"));
        assert_eq!(store.save_count(), saves + 1);
    }

    #[test]
    fn revert_rejects_sell_that_never_reduced_the_lot() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        let txn = ledger
            .record_trade(TradeSide::Sell, &id, d("10"), d("120"), TradeDetails::default())
            .unwrap();
        let lot_before = ledger.stock(&id).unwrap().clone();

        let err = ledger.revert_transaction(&txn.id).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedOperation(_)));
        assert_eq!(ledger.stock(&id).unwrap(), &lot_before);
        assert_eq!(lot_before.quantity, d("30"));
        assert!(!ledger.transaction(&txn.id).unwrap().is_reverted());
    }

    #[test]
    fn revert_rejects_sell_larger_than_recorded_sales() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        ledger
            .sell_stock(&id, d("5"), d("120"), SalePurpose::Other, None)
            .unwrap();
        let recorded = ledger
            .record_trade(TradeSide::Sell, &id, d("8"), d("120"), TradeDetails::default())
            .unwrap();
        assert!(matches!(
            ledger.revert_transaction(&recorded.id),
            Err(LedgerError::UnsupportedOperation(_))
        ));
        assert_eq!(ledger.stock(&id).unwrap().quantity, d("25"));
    }

    #[test]
    fn transaction_dates_never_go_backwards() {
        let store = MemoryStore::new();
        let (mut ledger, id) = ledger_with_lot(&store);
        for _ in 0..5 {
            ledger
                .sell_stock(&id, d("1"), d("120"), SalePurpose::Other, None)
                .unwrap();
        }
        let dates: Vec<_> = ledger.data().transactions.iter().map(|t| t.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }
}
