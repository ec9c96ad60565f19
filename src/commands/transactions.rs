// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::{LedgerTransaction, TxKind, TxStatus};
use crate::queries::{self, Paginated, TransactionFilter};
use crate::utils::{date_or_today, fmt_money, maybe_print_json, parse_date, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(conn, sub)?,
        Some(("stats", sub)) => stats(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn stats(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let today = date_or_today(sub.get_one::<String>("date"))?;
    let s = queries::transaction_stats(conn, today)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
        let rows = vec![
            vec!["Entries".into(), s.total.to_string()],
            vec!["Pending".into(), s.pending.to_string()],
            vec!["Completed".into(), s.completed.to_string()],
            vec!["Failed".into(), s.failed.to_string()],
            vec!["Cancelled".into(), s.cancelled.to_string()],
            vec!["Deposits".into(), fmt_money(&s.deposits)],
            vec!["Purchases".into(), fmt_money(&s.purchases)],
            vec!["Claims".into(), fmt_money(&s.claims)],
            vec!["Referral bonuses".into(), fmt_money(&s.referral_bonuses)],
            vec!["Withdrawals".into(), fmt_money(&s.withdrawals)],
            vec!["Today".into(), s.today.to_string()],
            vec!["This week".into(), s.this_week.to_string()],
            vec!["This month".into(), s.this_month.to_string()],
        ];
        println!("{}", pretty_table(&["Metric", "Value"], rows));
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .items
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    t.account_id.to_string(),
                    t.kind.to_string(),
                    fmt_money(&t.amount),
                    t.status.to_string(),
                    t.subscription_id.map(|s| s.to_string()).unwrap_or_default(),
                    t.description.clone().unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "When", "Account", "Type", "Amount", "Status", "Sub", "Note"],
                rows,
            )
        );
        super::print_pagination(&data.pagination);
    }
    Ok(())
}

pub fn query_rows(
    conn: &Connection,
    sub: &clap::ArgMatches,
) -> Result<Paginated<LedgerTransaction>> {
    let (page, sort) = super::listing(sub)?;
    let filter = TransactionFilter {
        account_id: sub.get_one::<i64>("account").copied(),
        kind: sub
            .get_one::<String>("type")
            .map(|s| s.parse::<TxKind>())
            .transpose()?,
        status: sub
            .get_one::<String>("status")
            .map(|s| s.parse::<TxStatus>())
            .transpose()?,
        from: sub.get_one::<String>("from").map(|s| parse_date(s)).transpose()?,
        to: sub.get_one::<String>("to").map(|s| parse_date(s)).transpose()?,
    };
    Ok(queries::list_transactions(conn, &filter, &sort, page)?)
}
