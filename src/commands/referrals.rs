// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::ledger::referrals;
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, settings: &Settings, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("register", sub)) => {
            let code = sub.get_one::<String>("code").unwrap();
            let account = *sub.get_one::<i64>("account").unwrap();
            let (record, posting) =
                referrals::register_referral(conn, &settings.ledger, code, account)?;
            println!(
                "Referral {} recorded: account {} referred by {}, bonus {} paid (balance {})",
                record.id,
                record.referred_id,
                record.referrer_id,
                fmt_money(&record.bonus_amount),
                fmt_money(&posting.balance)
            );
        }
        Some(("pay", sub)) => {
            let (record, posting) = referrals::pay_bonus(conn, *sub.get_one::<i64>("id").unwrap())?;
            println!(
                "Paid {} to account {} (balance {})",
                fmt_money(&record.bonus_amount),
                record.referrer_id,
                fmt_money(&posting.balance)
            );
        }
        Some(("list", sub)) => {
            let list = referrals::list_for_referrer(conn, *sub.get_one::<i64>("account").unwrap())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
                let rows = list
                    .iter()
                    .map(|r| {
                        vec![
                            r.id.to_string(),
                            r.referred_id.to_string(),
                            fmt_money(&r.bonus_amount),
                            if r.paid { "paid" } else { "unpaid" }.to_string(),
                            r.created_at.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Referred", "Bonus", "Status", "Created"], rows)
                );
            }
        }
        Some(("summary", sub)) => {
            let s = referrals::summary(conn, *sub.get_one::<i64>("account").unwrap())?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
                println!(
                    "Code {}: {} referrals, {} paid, total bonus {}",
                    s.referral_code,
                    s.total_referrals,
                    s.paid_referrals,
                    fmt_money(&s.total_bonus)
                );
            }
        }
        _ => {}
    }
    Ok(())
}
