// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use std::str::FromStr;
use stockemi::fees::{compute_brokerage, compute_net_amount};
use stockemi::ledger::LedgerStore;
use stockemi::models::{BrokerageConfig, NewLot, SalePurpose, TradeSide};
use stockemi::store::MemoryStore;
use stockemi::{cli, commands::fees};

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn run_fees(ledger: &mut LedgerStore<&MemoryStore>, args: &[&str]) {
    let mut argv = vec!["stockemi", "fees"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("fees", fees_m)) = matches.subcommand() {
        fees::handle(ledger, fees_m).unwrap();
    } else {
        panic!("no fees subcommand");
    }
}

#[test]
fn set_updates_only_named_rates() {
    let store = MemoryStore::new();
    let mut ledger = LedgerStore::open(&store).unwrap();
    run_fees(&mut ledger, &["set", "--min-charge", "5", "--ipft", "0"]);

    let cfg = ledger.brokerage_config();
    assert_eq!(cfg.min_charge, d("5"));
    assert_eq!(cfg.ipft_charges, Some(Decimal::ZERO));
    assert_eq!(cfg.max_charge, BrokerageConfig::default().max_charge);
    assert_eq!(
        store.snapshot().unwrap().brokerage_config.min_charge,
        d("5")
    );

    run_fees(&mut ledger, &["reset"]);
    assert_eq!(ledger.brokerage_config(), &BrokerageConfig::default());
}

#[test]
fn trades_carry_the_configured_charges() {
    let store = MemoryStore::new();
    let mut ledger = LedgerStore::open(&store).unwrap();
    run_fees(
        &mut ledger,
        &["set", "--min-charge", "5", "--ipft", "0"],
    );
    let cfg = ledger.brokerage_config().clone();

    let (lot, buy) = ledger
        .add_stock(NewLot {
            name: "Ather Energy".into(),
            symbol: None,
            quantity: d("20"),
            trade_price: d("2000"),
            current_price: None,
            paid: None,
            purchase_date: None,
        })
        .unwrap();
    let expected_buy = compute_brokerage(d("20"), d("2000"), &cfg, TradeSide::Buy);
    assert_eq!(buy.total_amount, d("40000"));
    assert_eq!(buy.brokerage, expected_buy.total_charges);
    assert_eq!(buy.net_amount, expected_buy.net_amount);
    assert_eq!(buy.net_amount, d("40071.01"));

    let sell = ledger
        .sell_stock(&lot.id, d("20"), d("2100"), SalePurpose::Profit, None)
        .unwrap();
    assert_eq!(sell.net_amount, d("41963.92"));
    assert_eq!(sell.brokerage, d("36.08"));
    assert_eq!(sell.cost_total, Some(d("40000")));
    assert_eq!(sell.realized_pnl, Some(d("1963.92")));
}

#[test]
fn net_amount_is_a_projection_of_the_breakdown() {
    let cfg = BrokerageConfig::default();
    let b = compute_brokerage(d("7"), d("743.35"), &cfg, TradeSide::Sell);
    let n = compute_net_amount(d("7"), d("743.35"), &cfg, TradeSide::Sell);
    assert_eq!(n.gross_amount, b.turnover);
    assert_eq!(n.brokerage_total, b.total_charges);
    assert_eq!(n.net_amount, b.net_amount);
}
