// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use stockemi::ledger::LedgerStore;
use stockemi::store::{JsonFileStore, SYMBOLS_FILE, resolve_data_path};
use stockemi::{cli, commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();
    init_logging(matches.get_flag("verbose"));

    let data_path = resolve_data_path(matches.get_one::<String>("data").map(String::as_str))?;
    let symbols_path = matches
        .get_one::<String>("symbols")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_path.with_file_name(SYMBOLS_FILE));

    if let Some(("symbols", sub)) = matches.subcommand() {
        return commands::symbols::handle(&symbols_path, sub);
    }

    let mut ledger = LedgerStore::open(JsonFileStore::new(data_path.clone()))?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Data file ready at {}", data_path.display());
        }
        Some(("stock", sub)) => commands::stocks::handle(&mut ledger, sub)?,
        Some(("loan", sub)) => commands::loans::handle(&mut ledger, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&mut ledger, sub)?,
        Some(("fees", sub)) => commands::fees::handle(&mut ledger, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&ledger, sub)?,
        Some(("import", sub)) => commands::importer::handle(&mut ledger, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&ledger)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
