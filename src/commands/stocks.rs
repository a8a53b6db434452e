// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::LedgerStore;
use crate::models::{NewLot, SalePurpose, StockPatch};
use crate::quotes::{NseQuoteProvider, QuoteProvider};
use crate::store::DataStore;
use crate::utils::{
    fmt_money, maybe_print_json, opt_decimal, opt_string, parse_datetime, pretty_table,
    req_decimal, req_str,
};
use anyhow::{Result, bail};

pub fn handle<S: DataStore>(ledger: &mut LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(ledger, sub)?,
        Some(("list", sub)) => list(ledger, sub)?,
        Some(("sell", sub)) => sell(ledger, sub)?,
        Some(("sell-name", sub)) => sell_name(ledger, sub)?,
        Some(("positions", sub)) => positions(ledger, sub)?,
        Some(("price", sub)) => set_price(ledger, sub)?,
        Some(("sync", sub)) => {
            let name = req_str(sub, "name")?;
            let n = ledger.sync_price_by_name(name, req_decimal(sub, "price")?)?;
            println!("Updated {} open lot(s) of '{}'", n, name);
        }
        Some(("quote", sub)) => quote(ledger, sub, &NseQuoteProvider::new()?)?,
        Some(("refresh", _)) => {
            let n = ledger.refresh_prices(&NseQuoteProvider::new()?)?;
            println!("Refreshed prices on {} lot(s)", n);
        }
        Some(("summary", sub)) => summary(ledger, sub)?,
        _ => {}
    }
    Ok(())
}

fn add<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let lot = NewLot {
        name: req_str(sub, "name")?.to_string(),
        symbol: opt_string(sub, "symbol").map(|s| s.to_uppercase()),
        quantity: req_decimal(sub, "qty")?,
        trade_price: req_decimal(sub, "price")?,
        current_price: opt_decimal(sub, "current")?,
        paid: opt_decimal(sub, "paid")?,
        purchase_date: sub
            .get_one::<String>("date")
            .map(|d| parse_datetime(d))
            .transpose()?,
    };
    let (stock, txn) = ledger.add_stock(lot)?;
    println!(
        "Added lot {} ({} x {} = {}, charges {})",
        stock.id,
        stock.quantity,
        stock.trade_price,
        fmt_money(&stock.paid),
        fmt_money(&txn.brokerage)
    );
    Ok(())
}

fn list<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let all = sub.get_flag("all");
    let lots: Vec<_> = ledger
        .data()
        .stocks
        .iter()
        .filter(|s| all || s.status.is_open())
        .collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &lots)? {
        let rows = lots
            .iter()
            .map(|s| {
                vec![
                    s.id.clone(),
                    s.name.clone(),
                    s.symbol.clone().unwrap_or_default(),
                    s.quantity.to_string(),
                    s.trade_price.to_string(),
                    fmt_money(&s.paid),
                    s.current_price.to_string(),
                    fmt_money(&s.value),
                    fmt_money(&s.profit_loss),
                    s.status.to_string(),
                    s.purchase_date
                        .map(|d| d.date_naive().to_string())
                        .unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &[
                    "ID", "Name", "Symbol", "Qty", "Trade", "Paid", "Price", "Value", "P&L",
                    "Status", "Bought",
                ],
                rows,
            )
        );
    }
    Ok(())
}

fn purpose(sub: &clap::ArgMatches) -> Result<SalePurpose> {
    sub.get_one::<String>("purpose")
        .map(|p| p.parse())
        .unwrap_or(Ok(SalePurpose::Other))
}

fn sell<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let txn = ledger.sell_stock(
        req_str(sub, "id")?,
        req_decimal(sub, "qty")?,
        req_decimal(sub, "price")?,
        purpose(sub)?,
        opt_string(sub, "notes"),
    )?;
    println!(
        "Sold {} of {} @ {}: net {} (charges {}, realized {})",
        txn.quantity,
        txn.stock_name,
        txn.price,
        fmt_money(&txn.net_amount),
        fmt_money(&txn.brokerage),
        fmt_money(&txn.realized_pnl.unwrap_or_default())
    );
    Ok(())
}

fn sell_name<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let sale = ledger.sell_by_name(
        req_str(sub, "name")?,
        req_decimal(sub, "qty")?,
        req_decimal(sub, "price")?,
        purpose(sub)?,
        opt_string(sub, "notes"),
    )?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &sale)? {
        return Ok(());
    }
    let rows = sale
        .transactions
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.stock_id.clone(),
                t.quantity.to_string(),
                fmt_money(&t.brokerage),
                fmt_money(&t.net_amount),
                fmt_money(&t.realized_pnl.unwrap_or_default()),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Txn", "Lot", "Qty", "Charges", "Net", "Realized"], rows)
    );
    println!(
        "Total net {} after {} in charges",
        fmt_money(&sale.total_net_amount),
        fmt_money(&sale.total_brokerage)
    );
    Ok(())
}

fn positions<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let data = ledger.positions();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    p.symbol.clone().unwrap_or_default(),
                    p.lots.to_string(),
                    p.total_quantity.to_string(),
                    p.avg_trade_price.round_dp(2).to_string(),
                    fmt_money(&p.total_paid),
                    p.current_price.to_string(),
                    fmt_money(&p.value),
                    fmt_money(&p.profit_loss),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Name", "Symbol", "Lots", "Qty", "Avg", "Paid", "Price", "Value", "P&L"],
                rows,
            )
        );
    }
    Ok(())
}

fn set_price<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let patch = StockPatch {
        current_price: Some(req_decimal(sub, "price")?),
        ..Default::default()
    };
    let s = ledger.update_stock(req_str(sub, "id")?, patch)?;
    println!(
        "{} now {} (value {}, P&L {})",
        s.id,
        s.current_price,
        fmt_money(&s.value),
        fmt_money(&s.profit_loss)
    );
    Ok(())
}

fn quote<S: DataStore>(
    ledger: &mut LedgerStore<S>,
    sub: &clap::ArgMatches,
    provider: &dyn QuoteProvider,
) -> Result<()> {
    let symbol = req_str(sub, "symbol")?.to_uppercase();
    let Some(q) = provider.fetch_price(&symbol)? else {
        bail!("No quote available for {}", symbol);
    };
    let n = ledger.apply_quote(&symbol, &q)?;
    println!(
        "{} {} ({}%), applied to {} lot(s)",
        symbol, q.last_price, q.percent_change, n
    );
    Ok(())
}

fn summary<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let s = ledger.portfolio_summary();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
        let rows = vec![
            vec!["Invested".into(), fmt_money(&s.total_invested)],
            vec!["Current value".into(), fmt_money(&s.current_value)],
            vec!["P&L".into(), fmt_money(&s.profit_loss)],
            vec!["P&L %".into(), format!("{}%", s.profit_loss_percent)],
        ];
        println!("{}", pretty_table(&["Metric", "Amount"], rows));
    }
    Ok(())
}
