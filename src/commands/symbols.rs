// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use crate::quotes::{SymbolTable, refresh_symbol_list};
use crate::utils::{maybe_print_json, pretty_table, req_str};
use anyhow::{Context, Result};

pub fn handle(symbols_path: &Path, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("search", sub)) => {
            let table = load(symbols_path)?;
            let limit = sub.get_one::<usize>("limit").copied().unwrap_or(10);
            let hits = table.search(req_str(sub, "query")?, limit);
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &hits)? {
                let rows = hits
                    .iter()
                    .map(|e| vec![e.symbol.clone(), e.name.clone()])
                    .collect();
                println!("{}", pretty_table(&["Symbol", "Company"], rows));
            }
        }
        Some(("suggest", sub)) => {
            let table = load(symbols_path)?;
            let name = req_str(sub, "name")?;
            match table.suggest(name) {
                Some(e) => println!("{} ({})", e.symbol, e.name),
                None => println!("No symbol found for '{}'", name),
            }
        }
        Some(("refresh", _)) => {
            let bytes = refresh_symbol_list(symbols_path)?;
            println!("Saved {} bytes to {}", bytes, symbols_path.display());
        }
        _ => {}
    }
    Ok(())
}

fn load(path: &Path) -> Result<SymbolTable> {
    SymbolTable::load(path)
        .with_context(|| "Run `stockemi symbols refresh` or pass --symbols".to_string())
}
