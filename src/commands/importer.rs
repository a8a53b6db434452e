// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::LedgerStore;
use crate::models::AppData;
use crate::store::DataStore;
use crate::utils::req_str;
use anyhow::{Context, Result};

pub fn handle<S: DataStore>(ledger: &mut LedgerStore<S>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("data", sub)) => import_data(ledger, sub),
        _ => Ok(()),
    }
}

fn import_data<S: DataStore>(ledger: &mut LedgerStore<S>, sub: &clap::ArgMatches) -> Result<()> {
    let path = req_str(sub, "path")?;
    let raw = std::fs::read_to_string(path).with_context(|| format!("Open backup {}", path))?;
    let data: AppData =
        serde_json::from_str(&raw).with_context(|| format!("Parse backup {}", path))?;
    let (stocks, loans, txns) = (
        data.stocks.len(),
        data.loans.len(),
        data.transactions.len(),
    );
    ledger.replace_data(data)?;
    println!(
        "Imported {} lot(s), {} loan(s), {} transaction(s) from {}",
        stocks, loans, txns, path
    );
    Ok(())
}
