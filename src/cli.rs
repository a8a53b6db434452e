// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print JSON"))
        .arg(arg!(--jsonl "Print JSON lines"))
}

fn purpose_arg() -> Arg {
    arg!(--purpose <PURPOSE> "Why the shares are sold")
        .value_parser(["emi", "reinvest", "profit", "other"])
        .default_value("other")
}

fn stock_cmd() -> Command {
    Command::new("stock")
        .about("Stock lots")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Record a purchase as a new lot")
                .arg(arg!(--name <NAME> "Company or fund name").required(true))
                .arg(arg!(--qty <QTY> "Quantity bought").required(true))
                .arg(arg!(--price <PRICE> "Trade price per share").required(true))
                .arg(arg!(--symbol <SYMBOL> "Exchange symbol"))
                .arg(arg!(--paid <AMOUNT> "Cost basis (defaults to qty x price)"))
                .arg(arg!(--current <PRICE> "Current market price"))
                .arg(arg!(--date <DATE> "Purchase date YYYY-MM-DD")),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("List lots")
                .arg(arg!(--all "Include sold lots")),
        ))
        .subcommand(
            Command::new("sell")
                .about("Sell from a single lot")
                .arg(arg!(--id <STOCK_ID> "Lot id").required(true))
                .arg(arg!(--qty <QTY>).required(true))
                .arg(arg!(--price <PRICE>).required(true))
                .arg(purpose_arg())
                .arg(arg!(--notes <NOTES>)),
        )
        .subcommand(json_flags(
            Command::new("sell-name")
                .about("Sell across all lots of a name, oldest first")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--qty <QTY>).required(true))
                .arg(arg!(--price <PRICE>).required(true))
                .arg(purpose_arg())
                .arg(arg!(--notes <NOTES>)),
        ))
        .subcommand(json_flags(
            Command::new("positions").about("Open quantity and cost per name"),
        ))
        .subcommand(
            Command::new("price")
                .about("Set the current price of one lot")
                .arg(arg!(--id <STOCK_ID>).required(true))
                .arg(arg!(--price <PRICE>).required(true)),
        )
        .subcommand(
            Command::new("sync")
                .about("Set the current price on every open lot of a name")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--price <PRICE>).required(true)),
        )
        .subcommand(
            Command::new("quote")
                .about("Fetch a live quote and apply it to lots with that symbol")
                .arg(arg!(--symbol <SYMBOL>).required(true)),
        )
        .subcommand(Command::new("refresh").about("Fetch live quotes for all open lots"))
        .subcommand(json_flags(
            Command::new("summary").about("Invested, value and P&L of open lots"),
        ))
}

fn loan_cmd() -> Command {
    Command::new("loan")
        .about("EMI loans")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a loan and generate its schedule")
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--principal <AMOUNT>).required(true))
                .arg(arg!(--emi <AMOUNT> "Installment per month").required(true))
                .arg(arg!(--start <DATE> "Start date YYYY-MM-DD").required(true))
                .arg(
                    arg!(--day <DAY> "Day of month the EMI is due")
                        .value_parser(value_parser!(u32).range(1..=31)),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Change a loan's name, start date or payment day")
                .arg(arg!(--id <LOAN_ID>).required(true))
                .arg(arg!(--name <NAME>))
                .arg(arg!(--start <DATE>))
                .arg(arg!(--day <DAY>).value_parser(value_parser!(u32).range(1..=31))),
        )
        .subcommand(json_flags(Command::new("list").about("List loans")))
        .subcommand(json_flags(
            Command::new("schedule")
                .about("Show a loan's installments")
                .arg(arg!(--id <LOAN_ID>).required(true)),
        ))
        .subcommand(
            Command::new("pay")
                .about("Mark an installment paid")
                .arg(arg!(--id <LOAN_ID>).required(true))
                .arg(arg!(--month <MONTH>).required(true).value_parser(value_parser!(u32)))
                .arg(
                    arg!(--stock <STOCK_ID> "Lot sold to fund it")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("pay-with")
                .about("Sell lots and mark the installment paid")
                .arg(arg!(--id <LOAN_ID>).required(true))
                .arg(arg!(--month <MONTH>).required(true).value_parser(value_parser!(u32)))
                .arg(
                    arg!(--sale <SALE> "STOCK_ID:QTY:PRICE")
                        .required(true)
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("sell")
                .about("Sell from a lot towards an installment")
                .arg(arg!(--stock <STOCK_ID>).required(true))
                .arg(arg!(--qty <QTY>).required(true))
                .arg(arg!(--price <PRICE>).required(true))
                .arg(arg!(--loan <LOAN_ID>).required(true))
                .arg(arg!(--month <MONTH>).required(true).value_parser(value_parser!(u32))),
        )
        .subcommand(json_flags(
            Command::new("upcoming")
                .about("Next due installments across all loans")
                .arg(arg!(--today <DATE> "Reference date YYYY-MM-DD")),
        ))
        .subcommand(json_flags(
            Command::new("summary").about("Total, paid and pending EMI"),
        ))
}

fn tx_cmd() -> Command {
    Command::new("tx")
        .about("Trade log")
        .subcommand_required(true)
        .subcommand(json_flags(
            Command::new("list")
                .about("List transactions, newest first")
                .arg(arg!(--stock <STOCK_ID>))
                .arg(arg!(--limit <N>).value_parser(value_parser!(usize))),
        ))
        .subcommand(
            Command::new("revert")
                .about("Undo a sell, returning the shares to the lot")
                .arg(arg!(--id <TXN_ID>).required(true)),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove a record without touching lots")
                .arg(arg!(--id <TXN_ID>).required(true)),
        )
        .subcommand(
            Command::new("reinvest")
                .about("Buy a new lot with the proceeds of a sell")
                .arg(arg!(--from <TXN_ID> "Funding sell transaction").required(true))
                .arg(arg!(--name <NAME>).required(true))
                .arg(arg!(--qty <QTY>).required(true))
                .arg(arg!(--price <PRICE>).required(true))
                .arg(arg!(--symbol <SYMBOL>)),
        )
}

fn fees_cmd() -> Command {
    let mut set = Command::new("set").about("Update fee rates");
    for (flag, help) in [
        ("buy-rate", "Brokerage % on buys"),
        ("sell-rate", "Brokerage % on sells"),
        ("min-charge", "Minimum brokerage per order"),
        ("max-charge", "Maximum brokerage per order"),
        ("stt-buy", "STT % on buys"),
        ("stt-sell", "STT % on sells"),
        ("exchange", "Exchange transaction charge %"),
        ("sebi", "SEBI turnover fee %"),
        ("ipft", "IPFT charge %"),
        ("gst", "GST % on brokerage and charges"),
        ("stamp-buy", "Stamp duty % on buys"),
        ("stamp-sell", "Stamp duty % on sells"),
    ] {
        set = set.arg(Arg::new(flag).long(flag).value_name("VALUE").help(help));
    }
    Command::new("fees")
        .about("Brokerage and statutory charges")
        .subcommand_required(true)
        .subcommand(json_flags(
            Command::new("calc")
                .about("Break down the charges on a trade")
                .arg(arg!(--qty <QTY>).required(true))
                .arg(arg!(--price <PRICE>).required(true))
                .arg(
                    arg!(--side <SIDE>)
                        .value_parser(["buy", "sell"])
                        .default_value("buy"),
                ),
        ))
        .subcommand(json_flags(Command::new("show").about("Show fee rates")))
        .subcommand(set)
        .subcommand(Command::new("reset").about("Restore the default rate card"))
}

fn symbols_cmd() -> Command {
    Command::new("symbols")
        .about("Exchange symbol lookup")
        .subcommand_required(true)
        .subcommand(json_flags(
            Command::new("search")
                .arg(arg!(--query <QUERY>).required(true))
                .arg(
                    arg!(--limit <N>)
                        .value_parser(value_parser!(usize))
                        .default_value("10"),
                ),
        ))
        .subcommand(Command::new("suggest").arg(arg!(--name <COMPANY>).required(true)))
        .subcommand(Command::new("refresh").about("Download the exchange equity list"))
}

pub fn build_cli() -> Command {
    Command::new("stockemi")
        .about("Stock lots, EMI loans and brokerage-aware trade ledger")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(--data <PATH> "Data file (default: platform data dir)").global(true))
        .arg(arg!(--symbols <PATH> "Equity list CSV").global(true))
        .arg(arg!(-v --verbose "Log progress to stderr").global(true))
        .subcommand(Command::new("init").about("Create the data file if missing"))
        .subcommand(stock_cmd())
        .subcommand(loan_cmd())
        .subcommand(tx_cmd())
        .subcommand(fees_cmd())
        .subcommand(symbols_cmd())
        .subcommand(
            Command::new("export")
                .about("Write data out")
                .subcommand_required(true)
                .subcommand(
                    Command::new("data")
                        .about("Whole document as JSON")
                        .arg(arg!(--out <PATH>).required(true)),
                )
                .subcommand(
                    Command::new("transactions")
                        .about("Trade log as CSV or JSON")
                        .arg(arg!(--out <PATH>).required(true))
                        .arg(
                            arg!(--format <FORMAT>)
                                .value_parser(["csv", "json"])
                                .default_value("csv"),
                        ),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Load data in")
                .subcommand_required(true)
                .subcommand(
                    Command::new("data")
                        .about("Replace everything with a JSON backup")
                        .arg(arg!(--path <PATH>).required(true)),
                ),
        )
        .subcommand(Command::new("doctor").about("Check ledger invariants"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn pay_with_collects_every_sale() {
        let m = build_cli().get_matches_from([
            "stockemi", "loan", "pay-with", "--id", "loan-1", "--month", "2", "--sale",
            "stock-a:10:700", "--sale", "stock-b:5:11.9",
        ]);
        let (_, loan) = m.subcommand().unwrap();
        let (_, pay) = loan.subcommand().unwrap();
        let sales: Vec<&String> = pay.get_many::<String>("sale").unwrap().collect();
        assert_eq!(sales.len(), 2);
        assert_eq!(*pay.get_one::<u32>("month").unwrap(), 2);
    }
}
