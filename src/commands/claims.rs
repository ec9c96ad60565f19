// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::claims::{self, LogNotifier};
use crate::utils::{date_or_today, fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;
use std::sync::atomic::AtomicBool;

pub fn handle(
    conn: &mut Connection,
    m: &clap::ArgMatches,
    cancel: &AtomicBool,
) -> Result<()> {
    match m.subcommand() {
        Some(("run", sub)) => {
            let id = *sub.get_one::<i64>("subscription").unwrap();
            let as_of = date_or_today(sub.get_one::<String>("date"))?;
            let outcome = claims::claim(conn, id, as_of)?;
            println!(
                "Claimed {} for subscription {} on {} (balance {}){}",
                fmt_money(&outcome.amount),
                id,
                as_of,
                fmt_money(&outcome.posting.balance),
                if outcome.completed() { ", subscription completed" } else { "" }
            );
        }
        Some(("sweep", sub)) => {
            let as_of = date_or_today(sub.get_one::<String>("date"))?;
            let report = claims::sweep(conn, as_of, &LogNotifier, cancel)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
                println!(
                    "{}",
                    pretty_table(
                        &["Claimed", "Credited", "Completed", "Expired", "Skipped", "Failed"],
                        vec![vec![
                            report.claimed.to_string(),
                            fmt_money(&report.credited),
                            report.completed.to_string(),
                            report.expired.to_string(),
                            report.skipped.to_string(),
                            report.failures.len().to_string(),
                        ]],
                    )
                );
                for f in &report.failures {
                    eprintln!("subscription {}: {}", f.subscription_id, f.error);
                }
                if report.interrupted {
                    eprintln!("sweep interrupted; run it again to finish");
                }
            }
        }
        Some(("remind", _)) => {
            let report = claims::send_reminders(conn, &LogNotifier)?;
            println!(
                "Reminded {} accounts ({} failed)",
                report.sent,
                report.failed.len()
            );
        }
        _ => {}
    }
    Ok(())
}
