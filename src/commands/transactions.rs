// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::LedgerStore;
use crate::models::{NewLot, Transaction};
use crate::store::DataStore;
use crate::utils::{fmt_money, maybe_print_json, opt_string, pretty_table, req_decimal, req_str};
use anyhow::Result;

pub fn handle<S: DataStore>(ledger: &mut LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(ledger, sub)?,
        Some(("revert", sub)) => {
            let stock = ledger.revert_transaction(req_str(sub, "id")?)?;
            println!(
                "Reverted; lot {} now holds {} ({})",
                stock.id, stock.quantity, stock.status
            );
        }
        Some(("delete", sub)) => {
            let id = req_str(sub, "id")?;
            if ledger.delete_transaction(id)? {
                println!("Deleted transaction {}", id);
            } else {
                println!("No transaction {}", id);
            }
        }
        Some(("reinvest", sub)) => reinvest(ledger, sub)?,
        _ => {}
    }
    Ok(())
}

/// Newest first, optionally narrowed to one lot.
pub fn query_rows<'a, S: DataStore>(
    ledger: &'a LedgerStore<S>,
    sub: &clap::ArgMatches,
) -> Vec<&'a Transaction> {
    let stock = sub.get_one::<String>("stock");
    let mut data: Vec<&Transaction> = ledger
        .data()
        .transactions
        .iter()
        .filter(|t| stock.is_none_or(|s| &t.stock_id == s))
        .collect();
    // Later entries win ties.
    data.reverse();
    data.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(limit) = sub.get_one::<usize>("limit") {
        data.truncate(*limit);
    }
    data
}

fn list<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(ledger, sub);
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.date.format("%Y-%m-%d %H:%M").to_string(),
                    t.side.to_string(),
                    t.stock_name.clone(),
                    t.quantity.to_string(),
                    t.price.to_string(),
                    fmt_money(&t.brokerage),
                    fmt_money(&t.net_amount),
                    t.realized_pnl.map(|p| fmt_money(&p)).unwrap_or_default(),
                    t.purpose.map(|p| p.to_string()).unwrap_or_default(),
                    if t.is_reverted() { "reverted".into() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Date", "Side", "Stock", "Qty", "Price", "Charges", "Net", "Realized",
                    "Purpose", "",
                ],
                rows,
            )
        );
    }
    Ok(())
}

fn reinvest<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let lot = NewLot {
        name: req_str(sub, "name")?.to_string(),
        symbol: opt_string(sub, "symbol").map(|s| s.to_uppercase()),
        quantity: req_decimal(sub, "qty")?,
        trade_price: req_decimal(sub, "price")?,
        current_price: None,
        paid: None,
        purchase_date: None,
    };
    let (stock, txn) = ledger.buy_with_proceeds(req_str(sub, "from")?, lot)?;
    println!(
        "Bought lot {} for {} from the proceeds of {}",
        stock.id,
        fmt_money(&txn.net_amount),
        txn.linked_buy_id.unwrap_or_default()
    );
    Ok(())
}
