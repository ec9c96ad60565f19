// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Duration, NaiveDate};
use investledger::config::LedgerSettings;
use investledger::db;
use investledger::ledger::accounts::{self, NewAccount};
use investledger::ledger::catalog::{self, PackageDraft};
use investledger::ledger::claims::{self, Notifier};
use investledger::ledger::{audit, subscriptions};
use investledger::models::{Account, Subscription};
use investledger::ErrorKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;

struct Quiet;

impl Notifier for Quiet {
    fn claim_credited(&self, _: &Account, _: &Subscription, _: Decimal) -> anyhow::Result<()> {
        Ok(())
    }

    fn remind(&self, _: &Account) -> anyhow::Result<()> {
        Ok(())
    }
}

fn assert_consistent(conn: &Connection, step: usize, seed: u64) {
    let issues = audit::reconcile(conn).unwrap();
    assert!(
        issues.is_empty(),
        "seed {seed} step {step}: ledger out of balance: {issues:?}"
    );
    let negative: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM accounts WHERE CAST(balance AS REAL) < 0",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(negative, 0, "seed {seed} step {step}: negative balance");
}

fn run(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut conn = db::open_in_memory().unwrap();
    let settings = LedgerSettings::default();

    let mut accts = Vec::new();
    for t in 1..=4 {
        let code = accts
            .first()
            .filter(|_| t % 2 == 0)
            .map(|a: &Account| a.referral_code.clone());
        let reg = accounts::register(
            &mut conn,
            &settings,
            &NewAccount {
                telegram_id: t,
                ..Default::default()
            },
            code.as_deref(),
        )
        .unwrap();
        accts.push(reg.account);
    }
    let ids: Vec<i64> = accts.iter().map(|a| a.id).collect();

    let mut pkgs = Vec::new();
    for (price, days, rate) in [(5_000i64, 3, "0.03"), (20_000, 7, "0.015"), (75_000, 14, "0.0125")] {
        pkgs.push(
            catalog::create(
                &conn,
                &settings,
                &PackageDraft {
                    name: format!("Plan {price}"),
                    description: None,
                    price: Decimal::from(price),
                    duration_days: days,
                    daily_return_rate: rate.parse().unwrap(),
                },
            )
            .unwrap()
            .id,
        );
    }

    let mut today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut pending = Vec::new();
    let cancel = AtomicBool::new(false);

    for step in 0..300 {
        let acct = ids[rng.gen_range(0..ids.len())];
        let result = match rng.gen_range(0..8) {
            0 => accounts::deposit(&mut conn, acct, Decimal::from(rng.gen_range(1..50_000i64)), None)
                .map(|_| ()),
            1 | 2 => {
                let pkg = pkgs[rng.gen_range(0..pkgs.len())];
                subscriptions::purchase(&mut conn, acct, pkg, today).map(|_| ())
            }
            3 => {
                let subs = subscriptions::list_for_account(&conn, acct).unwrap();
                if subs.is_empty() {
                    Ok(())
                } else {
                    let s = &subs[rng.gen_range(0..subs.len())];
                    claims::claim(&mut conn, s.id, today).map(|_| ())
                }
            }
            4 => accounts::request_withdrawal(
                &mut conn,
                acct,
                Decimal::new(rng.gen_range(1..3_000_000), 2),
            )
            .map(|t| pending.push(t.id)),
            5 if !pending.is_empty() => {
                let tx = pending.swap_remove(rng.gen_range(0..pending.len()));
                accounts::settle_withdrawal(&mut conn, tx, rng.gen_bool(0.7)).map(|_| ())
            }
            6 => {
                today += Duration::days(1);
                claims::sweep(&mut conn, today, &Quiet, &cancel).map(|report| {
                    assert!(report.failures.is_empty(), "sweep failures: {:?}", report.failures);
                })
            }
            _ => {
                today += Duration::days(rng.gen_range(0..3));
                Ok(())
            }
        };
        if let Err(e) = result {
            assert_ne!(e.kind(), ErrorKind::Internal, "seed {seed} step {step}: {e}");
            assert_ne!(e.kind(), ErrorKind::Conflict, "seed {seed} step {step}: {e}");
        }
        assert_consistent(&conn, step, seed);
    }
}

#[test]
fn random_operation_sequences_keep_the_ledger_balanced() {
    for seed in [1, 7, 42, 2025, 31337] {
        run(seed);
    }
}
