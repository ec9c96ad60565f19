// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::subscriptions;
use crate::models::SubscriptionStatus;
use crate::queries::{self, SubscriptionFilter};
use crate::utils::{date_or_today, fmt_money, fmt_rate, maybe_print_json, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("buy", sub)) => {
            let account = *sub.get_one::<i64>("account").unwrap();
            let package = *sub.get_one::<i64>("package").unwrap();
            let as_of = date_or_today(sub.get_one::<String>("date"))?;
            let bought = subscriptions::purchase(conn, account, package, as_of)
                .with_context(|| format!("Account {} buying package {}", account, package))?;
            println!(
                "Subscription {} active {} to {} (balance {})",
                bought.subscription.id,
                bought.subscription.start_date,
                bought.subscription.end_date,
                fmt_money(&bought.posting.balance)
            );
        }
        Some(("quote", sub)) => {
            let q = subscriptions::quote(
                conn,
                *sub.get_one::<i64>("account").unwrap(),
                *sub.get_one::<i64>("package").unwrap(),
            )?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &q)? {
                println!(
                    "{}",
                    pretty_table(
                        &["Price", "Balance", "After", "Shortfall", "Daily", "Total return"],
                        vec![vec![
                            fmt_money(&q.price),
                            fmt_money(&q.balance),
                            fmt_money(&q.balance_after),
                            fmt_money(&q.shortfall),
                            fmt_money(&q.daily_accrual),
                            fmt_money(&q.total_return),
                        ]],
                    )
                );
            }
        }
        Some(("list", sub)) => {
            let (page, sort) = super::listing(sub)?;
            let filter = SubscriptionFilter {
                account_id: sub.get_one::<i64>("account").copied(),
                status: sub
                    .get_one::<String>("status")
                    .map(|s| s.parse::<SubscriptionStatus>())
                    .transpose()?,
            };
            let result = queries::list_subscriptions(conn, &filter, &sort, page)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &result)? {
                let rows = result
                    .items
                    .iter()
                    .map(|s| {
                        vec![
                            s.id.to_string(),
                            s.account_id.to_string(),
                            s.package_id.to_string(),
                            fmt_money(&s.principal),
                            fmt_rate(&s.daily_return_rate),
                            s.start_date.to_string(),
                            s.end_date.to_string(),
                            s.last_claim_date
                                .map(|d| d.to_string())
                                .unwrap_or_default(),
                            s.status.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &[
                            "ID", "Account", "Package", "Principal", "Daily", "Start", "End",
                            "Last claim", "Status",
                        ],
                        rows,
                    )
                );
                super::print_pagination(&result.pagination);
            }
        }
        Some(("cancel", sub)) => {
            let s = subscriptions::cancel(conn, *sub.get_one::<i64>("id").unwrap())?;
            println!("Subscription {} cancelled", s.id);
        }
        _ => {}
    }
    Ok(())
}
