// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::LedgerStore;
use crate::store::DataStore;
use crate::utils::req_str;
use anyhow::{Context, Result, bail};

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

pub fn handle<S: DataStore>(ledger: &LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("data", sub)) => export_data(ledger, sub),
        Some(("transactions", sub)) => export_transactions(ledger, sub),
        _ => Ok(()),
    }
}

fn export_data<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let out = req_str(sub, "out")?;
    std::fs::write(out, serde_json::to_string_pretty(ledger.data())?)
        .with_context(|| format!("Write {}", out))?;
    println!("Exported data to {}", out);
    Ok(())
}

fn export_transactions<S: DataStore>(
    ledger: &LedgerStore<S>,
    sub: &clap::ArgMatches,
) -> Result<()> {
    let fmt = sub
        .get_one::<String>("format")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "csv".into());
    let out = req_str(sub, "out")?;

    let mut txns: Vec<_> = ledger.data().transactions.iter().collect();
    txns.sort_by_key(|t| t.date);

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id",
                "date",
                "type",
                "stock_id",
                "stock_name",
                "quantity",
                "price",
                "total_amount",
                "brokerage",
                "net_amount",
                "cost_total",
                "realized_pnl",
                "purpose",
                "loan_id",
                "emi_month",
                "linked_buy_id",
                "reverted",
                "notes",
            ])?;
            for t in txns {
                wtr.write_record([
                    t.id.clone(),
                    t.date.to_rfc3339(),
                    t.side.to_string(),
                    t.stock_id.clone(),
                    t.stock_name.clone(),
                    t.quantity.to_string(),
                    t.price.to_string(),
                    t.total_amount.to_string(),
                    t.brokerage.to_string(),
                    t.net_amount.to_string(),
                    opt(t.cost_total),
                    opt(t.realized_pnl),
                    opt(t.purpose),
                    opt(t.loan_id.as_ref()),
                    opt(t.emi_month),
                    opt(t.linked_buy_id.as_ref()),
                    t.is_reverted().to_string(),
                    opt(t.notes.as_ref()),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(&txns)?)?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    println!("Exported transactions to {}", out);
    Ok(())
}
