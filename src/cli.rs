// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, arg, value_parser};

fn output_flags(cmd: Command) -> Command {
    cmd.arg(arg!(--json "Print JSON").action(ArgAction::SetTrue))
        .arg(arg!(--jsonl "Print one JSON object per line").action(ArgAction::SetTrue))
}

fn listing_flags(cmd: Command) -> Command {
    output_flags(cmd)
        .arg(arg!(--sort <FIELD> "Sort field"))
        .arg(arg!(--asc "Ascending order (default descending)").action(ArgAction::SetTrue))
        .arg(
            arg!(--page <N> "Page number, from 1")
                .value_parser(value_parser!(u32))
                .default_value("1"),
        )
        .arg(
            arg!(--limit <N> "Items per page, 1-100")
                .value_parser(value_parser!(u32))
                .default_value("10"),
        )
}

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .value_parser(value_parser!(i64))
}

fn date_flag() -> Arg {
    arg!(--date <DATE> "Ledger date YYYY-MM-DD (default: today, UTC)")
}

fn package_terms(cmd: Command) -> Command {
    cmd.arg(arg!(--name <NAME>).required(true))
        .arg(arg!(--price <AMOUNT>).required(true))
        .arg(
            arg!(--days <DAYS> "Duration in days")
                .required(true)
                .value_parser(value_parser!(u32)),
        )
        .arg(arg!(--rate <RATE> "Daily return as a fraction, e.g. 0.02").required(true))
        .arg(arg!(--description <TEXT>))
}

pub fn build_cli() -> Command {
    Command::new("investledger")
        .about("Investment packages, daily returns and referral bonuses on a SQLite ledger")
        .version(clap::crate_version!())
        .arg(
            arg!(-v --verbose "Debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(-q --quiet "Errors only")
                .global(true)
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("account")
                .about("Account holders and balances")
                .subcommand_required(true)
                .subcommand(
                    Command::new("register")
                        .arg(
                            arg!(--"telegram-id" <ID>)
                                .required(true)
                                .value_parser(value_parser!(i64)),
                        )
                        .arg(arg!(--username <NAME>))
                        .arg(arg!(--"first-name" <NAME>))
                        .arg(arg!(--"last-name" <NAME>))
                        .arg(arg!(--referrer <CODE> "Referral code of the inviting account")),
                )
                .subcommand(listing_flags(
                    Command::new("list")
                        .arg(arg!(--search <TEXT> "Match name, username or telegram id"))
                        .arg(arg!(--active "Active accounts only").action(ArgAction::SetTrue))
                        .arg(
                            arg!(--inactive "Inactive accounts only")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("active"),
                        )
                        .arg(arg!(--"min-balance" <AMOUNT>))
                        .arg(arg!(--"max-balance" <AMOUNT>)),
                ))
                .subcommand(output_flags(
                    Command::new("show").arg(id_arg("id", "Account id")),
                ))
                .subcommand(Command::new("activate").arg(id_arg("id", "Account id")))
                .subcommand(Command::new("deactivate").arg(id_arg("id", "Account id")))
                .subcommand(
                    Command::new("deposit")
                        .about("Credit a manual top-up")
                        .arg(id_arg("id", "Account id"))
                        .arg(Arg::new("amount").required(true))
                        .arg(arg!(--note <TEXT>)),
                )
                .subcommand(
                    Command::new("withdraw")
                        .about("Request a withdrawal; it stays pending until settled")
                        .arg(id_arg("id", "Account id"))
                        .arg(Arg::new("amount").required(true)),
                )
                .subcommand(
                    Command::new("settle")
                        .about("Approve or reject a pending withdrawal")
                        .arg(id_arg("tx", "Transaction id"))
                        .arg(arg!(--approve).action(ArgAction::SetTrue))
                        .arg(
                            arg!(--reject)
                                .action(ArgAction::SetTrue)
                                .conflicts_with("approve"),
                        )
                        .group(
                            clap::ArgGroup::new("decision")
                                .args(["approve", "reject"])
                                .required(true),
                        ),
                )
                .subcommand(output_flags(Command::new("stats").arg(date_flag()))),
        )
        .subcommand(
            Command::new("package")
                .about("Investment package catalog")
                .subcommand_required(true)
                .subcommand(package_terms(Command::new("add")))
                .subcommand(listing_flags(
                    Command::new("list")
                        .about("Cheapest first unless --sort is given (price, duration, rate, name, id)")
                        .arg(arg!(--search <TEXT> "Name or description substring"))
                        .arg(arg!(--all "Include inactive packages").action(ArgAction::SetTrue))
                        .arg(
                            arg!(--inactive "Only inactive packages")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("all"),
                        )
                        .arg(arg!(--"min-price" <AMOUNT>))
                        .arg(arg!(--"max-price" <AMOUNT>))
                        .arg(arg!(--"min-days" <DAYS>).value_parser(value_parser!(u32)))
                        .arg(arg!(--"max-days" <DAYS>).value_parser(value_parser!(u32))),
                ))
                .subcommand(package_terms(
                    Command::new("update").arg(id_arg("id", "Package id")),
                ))
                .subcommand(
                    Command::new("set-active")
                        .arg(id_arg("id", "Package id"))
                        .arg(
                            Arg::new("state")
                                .required(true)
                                .value_parser(value_parser!(bool)),
                        ),
                ),
        )
        .subcommand(
            Command::new("sub")
                .about("Package subscriptions")
                .subcommand_required(true)
                .subcommand(
                    Command::new("buy")
                        .arg(id_arg("account", "Account id"))
                        .arg(id_arg("package", "Package id"))
                        .arg(date_flag()),
                )
                .subcommand(output_flags(
                    Command::new("quote")
                        .arg(id_arg("account", "Account id"))
                        .arg(id_arg("package", "Package id")),
                ))
                .subcommand(listing_flags(
                    Command::new("list")
                        .arg(arg!(--account <ID>).value_parser(value_parser!(i64)))
                        .arg(arg!(--status <STATUS> "active, completed or cancelled")),
                ))
                .subcommand(Command::new("cancel").arg(id_arg("id", "Subscription id"))),
        )
        .subcommand(
            Command::new("claim")
                .about("Daily returns")
                .subcommand_required(true)
                .subcommand(
                    Command::new("run")
                        .arg(id_arg("subscription", "Subscription id"))
                        .arg(date_flag()),
                )
                .subcommand(output_flags(
                    Command::new("sweep")
                        .about("Claim every due subscription")
                        .arg(date_flag()),
                ))
                .subcommand(Command::new("remind").about("Remind active accounts to claim")),
        )
        .subcommand(
            Command::new("referral")
                .about("Referral records and bonuses")
                .subcommand_required(true)
                .subcommand(
                    Command::new("register")
                        .arg(Arg::new("code").required(true))
                        .arg(id_arg("account", "Referred account id")),
                )
                .subcommand(Command::new("pay").arg(id_arg("id", "Referral id")))
                .subcommand(output_flags(
                    Command::new("list").arg(id_arg("account", "Referrer account id")),
                ))
                .subcommand(output_flags(
                    Command::new("summary").arg(id_arg("account", "Referrer account id")),
                )),
        )
        .subcommand(
            Command::new("tx")
                .about("Journal")
                .subcommand_required(true)
                .subcommand(listing_flags(
                    Command::new("list")
                        .arg(arg!(--account <ID>).value_parser(value_parser!(i64)))
                        .arg(arg!(--"type" <KIND> "purchase, claim, deposit, withdraw, referral_bonus"))
                        .arg(arg!(--status <STATUS>))
                        .arg(arg!(--from <DATE>))
                        .arg(arg!(--to <DATE>)),
                ))
                .subcommand(output_flags(Command::new("stats").arg(date_flag()))),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand_required(true)
                .subcommand(
                    Command::new("transactions")
                        .arg(arg!(--format <FORMAT> "csv or json").required(true))
                        .arg(arg!(--out <PATH>).required(true)),
                ),
        )
        .subcommand(output_flags(
            Command::new("doctor").about("Reconcile balances against the journal"),
        ))
}
