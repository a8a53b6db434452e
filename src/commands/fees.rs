// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::fees::compute_brokerage;
use crate::ledger::LedgerStore;
use crate::models::{BrokerageConfig, BrokerageConfigPatch, TradeSide};
use crate::store::DataStore;
use crate::utils::{fmt_money, maybe_print_json, opt_decimal, pretty_table, req_decimal};
use anyhow::{Result, bail};

pub fn handle<S: DataStore>(ledger: &mut LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("calc", sub)) => calc(ledger, sub)?,
        Some(("show", sub)) => {
            let cfg = ledger.brokerage_config();
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), cfg)? {
                print_config(cfg);
            }
        }
        Some(("set", sub)) => {
            let patch = patch_from(sub)?;
            if patch.is_empty() {
                bail!("Nothing to update; pass at least one rate");
            }
            let cfg = ledger.update_brokerage_config(&patch)?;
            print_config(&cfg);
        }
        Some(("reset", _)) => {
            let cfg = ledger.reset_brokerage_config()?;
            print_config(&cfg);
        }
        _ => {}
    }
    Ok(())
}

pub fn patch_from(sub: &clap::ArgMatches) -> Result<BrokerageConfigPatch> {
    Ok(BrokerageConfigPatch {
        buy_rate: opt_decimal(sub, "buy-rate")?,
        sell_rate: opt_decimal(sub, "sell-rate")?,
        min_charge: opt_decimal(sub, "min-charge")?,
        max_charge: opt_decimal(sub, "max-charge")?,
        stt_buy: opt_decimal(sub, "stt-buy")?,
        stt_sell: opt_decimal(sub, "stt-sell")?,
        exchange_charges: opt_decimal(sub, "exchange")?,
        sebi_charges: opt_decimal(sub, "sebi")?,
        ipft_charges: opt_decimal(sub, "ipft")?,
        gst: opt_decimal(sub, "gst")?,
        stamp_duty_buy: opt_decimal(sub, "stamp-buy")?,
        stamp_duty_sell: opt_decimal(sub, "stamp-sell")?,
    })
}

fn calc<S: DataStore>(ledger: &LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let side: TradeSide = sub
        .get_one::<String>("side")
        .map(|s| s.as_str())
        .unwrap_or("buy")
        .parse()?;
    let b = compute_brokerage(
        req_decimal(sub, "qty")?,
        req_decimal(sub, "price")?,
        ledger.brokerage_config(),
        side,
    );
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &b)? {
        return Ok(());
    }
    let rows = vec![
        vec!["Turnover".into(), fmt_money(&b.turnover)],
        vec!["Brokerage".into(), fmt_money(&b.brokerage)],
        vec!["STT".into(), fmt_money(&b.stt)],
        vec!["Exchange".into(), fmt_money(&b.exchange_charges)],
        vec!["SEBI".into(), fmt_money(&b.sebi_charges)],
        vec!["IPFT".into(), fmt_money(&b.ipft)],
        vec!["GST".into(), fmt_money(&b.gst)],
        vec!["Stamp duty".into(), fmt_money(&b.stamp_duty)],
        vec!["Total charges".into(), fmt_money(&b.total_charges)],
        vec![format!("Net ({})", side), fmt_money(&b.net_amount)],
    ];
    println!("{}", pretty_table(&["Component", "Amount"], rows));
    Ok(())
}

fn print_config(cfg: &BrokerageConfig) {
    let rows = vec![
        vec!["Brokerage buy %".into(), cfg.buy_rate.to_string()],
        vec!["Brokerage sell %".into(), cfg.sell_rate.to_string()],
        vec!["Min charge".into(), fmt_money(&cfg.min_charge)],
        vec!["Max charge".into(), fmt_money(&cfg.max_charge)],
        vec!["STT buy %".into(), cfg.stt_buy.to_string()],
        vec!["STT sell %".into(), cfg.stt_sell.to_string()],
        vec!["Exchange %".into(), cfg.exchange_charges.to_string()],
        vec!["SEBI %".into(), cfg.sebi_charges.to_string()],
        vec![
            "IPFT %".into(),
            cfg.ipft_charges.map(|v| v.to_string()).unwrap_or("-".into()),
        ],
        vec!["GST %".into(), cfg.gst.to_string()],
        vec!["Stamp buy %".into(), cfg.stamp_duty_buy.to_string()],
        vec!["Stamp sell %".into(), cfg.stamp_duty_sell.to_string()],
    ];
    println!("{}", pretty_table(&["Rate", "Value"], rows));
}
