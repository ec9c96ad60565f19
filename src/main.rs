// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;

use investledger::config::Settings;
use investledger::{cli, commands, db};

fn init_logging(matches: &clap::ArgMatches) {
    let level = if matches.get_flag("verbose") {
        "debug"
    } else if matches.get_flag("quiet") {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();
    init_logging(&matches);

    let settings = Settings::load().context("Load configuration")?;
    let mut conn = db::open_or_init(&settings.database)?;
    let cancel = AtomicBool::new(false);

    match matches.subcommand() {
        Some(("init", _)) => {
            println!(
                "Database initialized at {}",
                db::db_path(&settings.database)?.display()
            );
        }
        Some(("account", sub)) => commands::accounts::handle(&mut conn, &settings, sub)?,
        Some(("package", sub)) => commands::packages::handle(&conn, &settings, sub)?,
        Some(("sub", sub)) => commands::subscriptions::handle(&mut conn, sub)?,
        Some(("claim", sub)) => commands::claims::handle(&mut conn, sub, &cancel)?,
        Some(("referral", sub)) => commands::referrals::handle(&mut conn, &settings, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
