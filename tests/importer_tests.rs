// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use std::io::Write;
use stockemi::ledger::LedgerStore;
use stockemi::models::LotStatus;
use stockemi::store::MemoryStore;
use stockemi::{cli, commands::importer};
use tempfile::NamedTempFile;

const BACKUP: &str = r#"{
  "stocks": [
    {
      "id": "stock-1", "name": "Tata Gold Exchange Traded Fund", "symbol": "TGOLDETF",
      "paid": 11030, "tradePrice": 11.03, "quantity": 1000, "currentPrice": 11.96,
      "value": 11960, "profitLoss": 930, "status": "active",
      "purchaseDate": "2024-01-15T00:00:00.000Z"
    }
  ],
  "loans": [],
  "transactions": [
    {
      "id": "txn-1", "type": "buy", "stockId": "stock-1",
      "stockName": "Tata Gold Exchange Traded Fund", "quantity": 1000, "price": 11.03,
      "totalAmount": 11030, "brokerage": 20.5, "netAmount": 11050.5,
      "date": "2024-01-15T00:00:00.000Z"
    }
  ],
  "brokerageConfig": {
    "buyRate": 0.05, "sellRate": 0.05, "minCharge": 20, "maxCharge": 20,
    "sttBuy": 0.1, "sttSell": 0.025, "exchangeCharges": 0.00297,
    "sebiCharges": 0.00001, "gst": 18, "stampDutyBuy": 0.015, "stampDutySell": 0.003
  },
  "lastUpdated": "2024-09-01T10:00:00.000Z"
}"#;

fn run_import(ledger: &mut LedgerStore<&MemoryStore>, path: &str) -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches_from(["stockemi", "import", "data", "--path", path]);
    if let Some(("import", import_m)) = matches.subcommand() {
        importer::handle(ledger, import_m)
    } else {
        panic!("no import subcommand");
    }
}

#[test]
fn import_replaces_the_document_and_persists() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", BACKUP).unwrap();
    let path = file.path().to_string_lossy().to_string();

    let store = MemoryStore::new();
    let mut ledger = LedgerStore::open(&store).unwrap();
    let saves = store.save_count();
    run_import(&mut ledger, &path).unwrap();

    assert_eq!(store.save_count(), saves + 1);
    let data = ledger.data();
    assert_eq!(data.stocks.len(), 1);
    assert_eq!(data.stocks[0].status, LotStatus::Active);
    assert_eq!(data.transactions.len(), 1);
    assert_eq!(data.brokerage_config.min_charge, Decimal::from(20));
    assert!(data.brokerage_config.ipft_charges.is_none());

    let saved = store.snapshot().unwrap();
    assert_eq!(saved.stocks, data.stocks);
}

#[test]
fn malformed_backup_leaves_ledger_alone() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{\"stocks\": [{{\"id\": 1}}]").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let store = MemoryStore::new();
    let mut ledger = LedgerStore::open(&store).unwrap();
    let before = ledger.data().clone();
    let saves = store.save_count();

    assert!(run_import(&mut ledger, &path).is_err());
    assert_eq!(ledger.data(), &before);
    assert_eq!(store.save_count(), saves);
}
