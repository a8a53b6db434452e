// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{LedgerStore, LotSale, due_date};
use crate::models::{LoanPatch, NewLoan};
use crate::store::DataStore;
use crate::utils::{
    fmt_money, maybe_print_json, opt_string, parse_date, parse_datetime, parse_decimal,
    pretty_table, req_decimal, req_str,
};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use serde::Serialize;

pub fn handle<S: DataStore>(ledger: &mut LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(ledger, sub)?,
        Some(("update", sub)) => update(ledger, sub)?,
        Some(("list", sub)) => list(ledger, sub)?,
        Some(("schedule", sub)) => schedule(ledger, sub)?,
        Some(("pay", sub)) => pay(ledger, sub)?,
        Some(("pay-with", sub)) => pay_with(ledger, sub)?,
        Some(("sell", sub)) => sell(ledger, sub)?,
        Some(("upcoming", sub)) => upcoming(ledger, sub)?,
        Some(("summary", sub)) => summary(ledger, sub)?,
        _ => {}
    }
    Ok(())
}

fn month(sub: &clap::ArgMatches) -> Result<u32> {
    sub.get_one::<u32>("month")
        .copied()
        .context("--month is required")
}

fn add<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let loan = ledger.add_loan(NewLoan {
        name: req_str(sub, "name")?.to_string(),
        principal_amount: req_decimal(sub, "principal")?,
        emi_per_month: req_decimal(sub, "emi")?,
        start_date: parse_datetime(req_str(sub, "start")?)?,
        payment_day: sub.get_one::<u32>("day").copied(),
    })?;
    println!(
        "Added loan {} '{}': {} over {} installment(s)",
        loan.id,
        loan.name,
        fmt_money(&loan.total_emi),
        loan.payments_schedule.len()
    );
    Ok(())
}

fn update<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let patch = LoanPatch {
        name: opt_string(sub, "name"),
        start_date: sub
            .get_one::<String>("start")
            .map(|d| parse_datetime(d))
            .transpose()?,
        payment_day: sub.get_one::<u32>("day").copied(),
    };
    let loan = ledger.update_loan(req_str(sub, "id")?, patch)?;
    println!("Updated loan {} '{}'", loan.id, loan.name);
    Ok(())
}

#[derive(Serialize)]
struct LoanRow {
    id: String,
    name: String,
    principal: String,
    emi_per_month: String,
    installments: usize,
    paid: usize,
    start_date: String,
}

fn list<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let data: Vec<LoanRow> = ledger
        .data()
        .loans
        .iter()
        .map(|l| LoanRow {
            id: l.id.clone(),
            name: l.name.clone(),
            principal: l.principal_amount.to_string(),
            emi_per_month: l.emi_per_month.to_string(),
            installments: l.payments_schedule.len(),
            paid: l.payments_schedule.iter().filter(|p| p.paid).count(),
            start_date: l.start_date.date_naive().to_string(),
        })
        .collect();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.name.clone(),
                    r.principal.clone(),
                    r.emi_per_month.clone(),
                    format!("{}/{}", r.paid, r.installments),
                    r.start_date.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Name", "Principal", "EMI", "Paid", "Start"], rows)
        );
    }
    Ok(())
}

fn schedule<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let id = req_str(sub, "id")?;
    let loan = ledger
        .loan(id)
        .ok_or_else(|| anyhow!("Loan '{}' not found", id))?;
    if maybe_print_json(
        sub.get_flag("json"),
        sub.get_flag("jsonl"),
        &loan.payments_schedule,
    )? {
        return Ok(());
    }
    let rows = loan
        .payments_schedule
        .iter()
        .map(|p| {
            vec![
                p.month.to_string(),
                due_date(loan, p).map(|d| d.to_string()).unwrap_or_default(),
                fmt_money(&p.emi_amount),
                fmt_money(&p.principal_remaining),
                if p.paid { "yes".into() } else { "".into() },
                p.stocks_sold
                    .as_ref()
                    .map(|s| s.join(","))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Month", "Due", "EMI", "Remaining", "Paid", "Lots sold"], rows)
    );
    Ok(())
}

fn pay<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let id = req_str(sub, "id")?;
    let month = month(sub)?;
    let stocks: Vec<String> = sub
        .get_many::<String>("stock")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    ledger.mark_emi_paid(id, month, stocks)?;
    println!("Marked installment {} of {} paid", month, id);
    Ok(())
}

/// `STOCK_ID:QTY:PRICE`
fn parse_sale(raw: &str) -> Result<LotSale> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [stock_id, qty, price] = parts[..] else {
        return Err(anyhow!("Invalid sale '{}', expected STOCK_ID:QTY:PRICE", raw));
    };
    Ok(LotSale {
        stock_id: stock_id.to_string(),
        quantity: parse_decimal(qty)?,
        price: parse_decimal(price)?,
    })
}

fn pay_with<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let id = req_str(sub, "id")?;
    let month = month(sub)?;
    let sales = sub
        .get_many::<String>("sale")
        .context("--sale is required")?
        .map(|s| parse_sale(s))
        .collect::<Result<Vec<_>>>()?;
    let txns = ledger.pay_emi_with_stocks(id, month, &sales)?;
    let net: rust_decimal::Decimal = txns.iter().map(|t| t.net_amount).sum();
    println!(
        "Installment {} of {} paid from {} sale(s), net {}",
        month,
        id,
        txns.len(),
        fmt_money(&net)
    );
    Ok(())
}

fn sell<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let txn = ledger.sell_for_emi(
        req_str(sub, "stock")?,
        req_decimal(sub, "qty")?,
        req_decimal(sub, "price")?,
        req_str(sub, "loan")?,
        month(sub)?,
    )?;
    println!(
        "Sold {} of {} towards installment {}: net {}",
        txn.quantity,
        txn.stock_name,
        txn.emi_month.unwrap_or_default(),
        fmt_money(&txn.net_amount)
    );
    Ok(())
}

fn upcoming<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let today = match sub.get_one::<String>("today") {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };
    let up = ledger.upcoming_emi(today);
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &up)? {
        return Ok(());
    }
    if up.count == 0 {
        println!("No upcoming installments");
        return Ok(());
    }
    let rows = up
        .items
        .iter()
        .map(|i| {
            vec![
                i.loan_name.clone(),
                i.month.to_string(),
                i.due_date.to_string(),
                fmt_money(&i.emi_amount),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Loan", "Month", "Due", "EMI"], rows));
    println!(
        "{} due on {}",
        fmt_money(&up.total_amount),
        up.date.map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(())
}

fn summary<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let s = ledger.emi_summary();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
        let rows = vec![
            vec!["Total EMI".into(), fmt_money(&s.total_emi)],
            vec!["Paid".into(), fmt_money(&s.paid_emi)],
            vec!["Pending".into(), fmt_money(&s.pending_emi)],
            vec!["Next installment".into(), fmt_money(&s.next_emi_amount)],
        ];
        println!("{}", pretty_table(&["Metric", "Amount"], rows));
    }
    Ok(())
}
