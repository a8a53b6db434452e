// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashSet;

use crate::ledger::LedgerStore;
use crate::models::{AppData, LotStatus, TradeSide};
use crate::store::DataStore;
use crate::utils::pretty_table;
use anyhow::Result;
use rust_decimal::Decimal;

pub fn handle<S: DataStore>(ledger: &LedgerStore<S>) -> Result<()> {
    let rows: Vec<Vec<String>> = find_issues(ledger.data())
        .into_iter()
        .map(|(kind, detail)| vec![kind.to_string(), detail])
        .collect();
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn find_issues(data: &AppData) -> Vec<(&'static str, String)> {
    let mut issues = Vec::new();

    // 1) Lot status vs quantity
    for s in &data.stocks {
        let sold_qty = s.sold_quantity.unwrap_or_default();
        if s.quantity < Decimal::ZERO {
            issues.push(("negative_quantity", format!("{} {}", s.id, s.quantity)));
        }
        match s.status {
            LotStatus::Sold if !s.quantity.is_zero() => {
                issues.push(("sold_lot_has_quantity", format!("{} {}", s.id, s.quantity)));
            }
            LotStatus::Active | LotStatus::Partial if s.quantity.is_zero() => {
                issues.push(("open_lot_empty", s.id.clone()));
            }
            LotStatus::Partial if sold_qty <= Decimal::ZERO => {
                issues.push(("partial_without_sales", s.id.clone()));
            }
            LotStatus::Active if sold_qty > Decimal::ZERO => {
                issues.push(("active_with_sales", format!("{} sold {}", s.id, sold_qty)));
            }
            _ => {}
        }
    }

    // 2) Schedules: months ascending, remaining principal decreasing to zero
    for l in &data.loans {
        let sched = &l.payments_schedule;
        let sorted = sched.windows(2).all(|w| w[0].month < w[1].month);
        let decreasing = sched
            .windows(2)
            .all(|w| w[0].principal_remaining > w[1].principal_remaining);
        if !sorted {
            issues.push(("schedule_unsorted", l.id.clone()));
        }
        if !decreasing {
            issues.push(("schedule_not_decreasing", l.id.clone()));
        }
        if let Some(last) = sched.last() {
            if !last.principal_remaining.is_zero() {
                issues.push((
                    "schedule_not_settled",
                    format!("{} month {} leaves {}", l.id, last.month, last.principal_remaining),
                ));
            }
        }
    }

    // 3) Transactions
    let lot_ids: HashSet<&str> = data.stocks.iter().map(|s| s.id.as_str()).collect();
    for t in &data.transactions {
        if !lot_ids.contains(t.stock_id.as_str()) {
            issues.push(("txn_unknown_lot", format!("{} -> {}", t.id, t.stock_id)));
        }
        if t.side == TradeSide::Sell && !t.is_reverted() && t.cost_total.is_none() {
            issues.push(("sell_missing_cost", t.id.clone()));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Loan;

    #[test]
    fn clean_document_has_no_issues() {
        assert!(find_issues(&AppData::default()).is_empty());
    }

    #[test]
    fn broken_schedule_is_reported() {
        let mut data = AppData::default();
        let mut schedule = Loan::build_schedule(Decimal::from(100), Decimal::from(40));
        schedule.swap(0, 1);
        data.loans.push(Loan {
            id: "loan-x".into(),
            name: "X".into(),
            principal_amount: Decimal::from(100),
            total_emi: Decimal::from(100),
            emi_per_month: Decimal::from(40),
            start_date: chrono::Utc::now(),
            payment_day: None,
            payments_schedule: schedule,
        });
        let kinds: Vec<&str> = find_issues(&data).into_iter().map(|(k, _)| k).collect();
        assert!(kinds.contains(&"schedule_unsorted"));
        assert!(kinds.contains(&"schedule_not_decreasing"));
    }
}
