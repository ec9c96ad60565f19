// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::ledger::accounts::{self, NewAccount};
use crate::models::Account;
use crate::queries::{self, AccountFilter};
use crate::utils::{date_or_today, fmt_money, maybe_print_json, parse_decimal, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, settings: &Settings, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("register", sub)) => register(conn, settings, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let acct = accounts::get(conn, id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &acct)? {
                println!("{}", pretty_table(&HEADERS, vec![row(&acct)]));
            }
        }
        Some(("activate", sub)) => {
            let acct = accounts::set_active(conn, *sub.get_one::<i64>("id").unwrap(), true)?;
            println!("Account {} activated", acct.id);
        }
        Some(("deactivate", sub)) => {
            let acct = accounts::set_active(conn, *sub.get_one::<i64>("id").unwrap(), false)?;
            println!("Account {} deactivated", acct.id);
        }
        Some(("deposit", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let note = sub.get_one::<String>("note").map(|s| s.trim());
            let posting = accounts::deposit(conn, id, amount, note)
                .with_context(|| format!("Deposit into account {}", id))?;
            println!(
                "Deposited {} into account {} (balance {})",
                fmt_money(&amount),
                id,
                fmt_money(&posting.balance)
            );
        }
        Some(("withdraw", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
            let pending = accounts::request_withdrawal(conn, id, amount)
                .with_context(|| format!("Withdrawal from account {}", id))?;
            println!(
                "Withdrawal {} of {} recorded as pending",
                pending.id,
                fmt_money(&amount)
            );
        }
        Some(("settle", sub)) => {
            let tx_id = *sub.get_one::<i64>("tx").unwrap();
            let settled = accounts::settle_withdrawal(conn, tx_id, sub.get_flag("approve"))?;
            println!("Withdrawal {} is now {}", settled.id, settled.status);
        }
        Some(("stats", sub)) => {
            let today = date_or_today(sub.get_one::<String>("date"))?;
            let stats = queries::account_stats(conn, today)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &stats)? {
                println!(
                    "{}",
                    pretty_table(
                        &["Total", "Active", "Inactive", "New today", "Active balance"],
                        vec![vec![
                            stats.total.to_string(),
                            stats.active.to_string(),
                            stats.inactive.to_string(),
                            stats.new_today.to_string(),
                            fmt_money(&stats.total_balance),
                        ]],
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}

const HEADERS: [&str; 8] = [
    "ID",
    "Telegram",
    "Name",
    "Code",
    "Balance",
    "Profit",
    "Bonus",
    "Active",
];

fn row(a: &Account) -> Vec<String> {
    vec![
        a.id.to_string(),
        a.telegram_id.to_string(),
        a.display_name(),
        a.referral_code.clone(),
        fmt_money(&a.balance),
        fmt_money(&a.total_profit),
        fmt_money(&a.referral_bonus_total),
        if a.active { "yes" } else { "no" }.to_string(),
    ]
}

fn register(conn: &mut Connection, settings: &Settings, sub: &clap::ArgMatches) -> Result<()> {
    let trimmed = |key: &str| {
        sub.get_one::<String>(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let new = NewAccount {
        telegram_id: *sub.get_one::<i64>("telegram-id").unwrap(),
        username: trimmed("username"),
        first_name: trimmed("first-name"),
        last_name: trimmed("last-name"),
    };
    let referrer = trimmed("referrer");
    let reg = accounts::register(conn, &settings.ledger, &new, referrer.as_deref())?;
    println!(
        "Registered account {} with referral code {}",
        reg.account.id, reg.account.referral_code
    );
    if let (Some(referral), Some(bonus)) = (&reg.referral, &reg.bonus) {
        println!(
            "Referral bonus {} paid to account {} (balance {})",
            fmt_money(&referral.bonus_amount),
            referral.referrer_id,
            fmt_money(&bonus.balance)
        );
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (page, sort) = super::listing(sub)?;
    let active = if sub.get_flag("active") {
        Some(true)
    } else if sub.get_flag("inactive") {
        Some(false)
    } else {
        None
    };
    let filter = AccountFilter {
        search: sub.get_one::<String>("search").cloned(),
        active,
        min_balance: sub
            .get_one::<String>("min-balance")
            .map(|s| parse_decimal(s))
            .transpose()?,
        max_balance: sub
            .get_one::<String>("max-balance")
            .map(|s| parse_decimal(s))
            .transpose()?,
    };
    let result = queries::list_accounts(conn, &filter, &sort, page)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &result)? {
        let rows = result.items.iter().map(row).collect();
        println!("{}", pretty_table(&HEADERS, rows));
        super::print_pagination(&result.pagination);
    }
    Ok(())
}
