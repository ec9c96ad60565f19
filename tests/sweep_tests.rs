// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::{Duration, NaiveDate};
use investledger::config::LedgerSettings;
use investledger::db;
use investledger::ledger::accounts::{self, NewAccount};
use investledger::ledger::catalog::{self, PackageDraft};
use investledger::ledger::claims::{self, Notifier};
use investledger::ledger::{audit, subscriptions};
use investledger::models::{Account, Subscription, SubscriptionStatus};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};

/// Records deliveries; fails for one account and can raise the cancel flag
/// after a number of deliveries.
#[derive(Default)]
struct Recorder<'a> {
    credited: RefCell<Vec<(i64, Decimal)>>,
    reminded: Cell<usize>,
    fail_for: Option<i64>,
    stop_after: Option<(usize, &'a AtomicBool)>,
}

impl Notifier for Recorder<'_> {
    fn claim_credited(
        &self,
        account: &Account,
        subscription: &Subscription,
        amount: Decimal,
    ) -> anyhow::Result<()> {
        self.credited.borrow_mut().push((subscription.id, amount));
        if let Some((n, flag)) = self.stop_after {
            if self.credited.borrow().len() >= n {
                flag.store(true, Ordering::Relaxed);
            }
        }
        if self.fail_for == Some(account.id) {
            return Err(anyhow!("chat {} unreachable", account.telegram_id));
        }
        Ok(())
    }

    fn remind(&self, account: &Account) -> anyhow::Result<()> {
        if self.fail_for == Some(account.id) {
            return Err(anyhow!("chat {} unreachable", account.telegram_id));
        }
        self.reminded.set(self.reminded.get() + 1);
        Ok(())
    }
}

fn day0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
}

/// Three funded accounts, each holding one subscription with the given term.
fn setup(terms: &[u32]) -> (Connection, Vec<i64>, Vec<i64>) {
    let mut conn = db::open_in_memory().unwrap();
    let settings = LedgerSettings::default();
    let mut accts = Vec::new();
    let mut subs = Vec::new();
    for (i, days) in terms.iter().enumerate() {
        let acct = accounts::register(
            &mut conn,
            &settings,
            &NewAccount {
                telegram_id: 1_000 + i as i64,
                ..Default::default()
            },
            None,
        )
        .unwrap()
        .account
        .id;
        accounts::deposit(&mut conn, acct, Decimal::from(1_000), None).unwrap();
        let pkg = catalog::create(
            &conn,
            &settings,
            &PackageDraft {
                name: format!("Term {days}"),
                description: None,
                price: Decimal::from(1_000),
                duration_days: *days,
                daily_return_rate: Decimal::new(5, 2),
            },
        )
        .unwrap()
        .id;
        let sub = subscriptions::purchase(&mut conn, acct, pkg, day0())
            .unwrap()
            .subscription
            .id;
        accts.push(acct);
        subs.push(sub);
    }
    (conn, accts, subs)
}

#[test]
fn sweep_claims_every_due_subscription_once() {
    let (mut conn, accts, subs) = setup(&[5, 5, 5]);
    let notifier = Recorder::default();
    let cancel = AtomicBool::new(false);
    let day1 = day0() + Duration::days(1);

    claims::claim(&mut conn, subs[1], day1).unwrap();
    let report = claims::sweep(&mut conn, day1, &notifier, &cancel).unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.credited, Decimal::from(100));
    assert!(report.failures.is_empty());
    assert_eq!(notifier.credited.borrow().len(), 2);

    let rerun = claims::sweep(&mut conn, day1, &notifier, &cancel).unwrap();
    assert_eq!(rerun.claimed, 0);
    for a in &accts {
        assert_eq!(accounts::get(&conn, *a).unwrap().balance, Decimal::from(50));
    }
}

#[test]
fn notifier_failures_do_not_stop_the_batch() {
    let (mut conn, accts, _) = setup(&[5, 5, 5]);
    let notifier = Recorder {
        fail_for: Some(accts[0]),
        ..Default::default()
    };
    let cancel = AtomicBool::new(false);
    let report = claims::sweep(&mut conn, day0() + Duration::days(1), &notifier, &cancel).unwrap();
    assert_eq!(report.claimed, 3);
    assert_eq!(report.notify_failures.len(), 1);
    // the claim itself stays committed
    assert_eq!(accounts::get(&conn, accts[0]).unwrap().balance, Decimal::from(50));

    let reminders = claims::send_reminders(&conn, &notifier).unwrap();
    assert_eq!(reminders.sent, 2);
    assert_eq!(reminders.failed.len(), 1);
    assert_eq!(notifier.reminded.get(), 2);
}

#[test]
fn interrupted_sweep_resumes_where_it_stopped() {
    let (mut conn, _, subs) = setup(&[5, 5, 5]);
    let cancel = AtomicBool::new(false);
    let notifier = Recorder {
        stop_after: Some((1, &cancel)),
        ..Default::default()
    };
    let day1 = day0() + Duration::days(1);

    let first = claims::sweep(&mut conn, day1, &notifier, &cancel).unwrap();
    assert!(first.interrupted);
    assert_eq!(first.claimed, 1);

    cancel.store(false, Ordering::Relaxed);
    let plain = Recorder::default();
    let second = claims::sweep(&mut conn, day1, &plain, &cancel).unwrap();
    assert!(!second.interrupted);
    assert_eq!(second.claimed, 2);
    for s in subs {
        assert_eq!(
            subscriptions::get(&conn, s).unwrap().last_claim_date,
            Some(day1)
        );
    }
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn matured_subscriptions_expire_without_accrual() {
    let (mut conn, accts, subs) = setup(&[2, 10, 10]);
    let notifier = Recorder::default();
    let cancel = AtomicBool::new(false);
    // nobody claimed during the short term; it ended on day 2
    let report = claims::sweep(&mut conn, day0() + Duration::days(3), &notifier, &cancel).unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.claimed, 2);
    assert_eq!(
        subscriptions::get(&conn, subs[0]).unwrap().status,
        SubscriptionStatus::Completed
    );
    assert_eq!(accounts::get(&conn, accts[0]).unwrap().balance, Decimal::ZERO);
}

#[test]
fn final_day_claim_completes_in_sweep() {
    let (mut conn, _, subs) = setup(&[1]);
    let notifier = Recorder::default();
    let cancel = AtomicBool::new(false);
    let report = claims::sweep(&mut conn, day0() + Duration::days(1), &notifier, &cancel).unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(
        subscriptions::get(&conn, subs[0]).unwrap().status,
        SubscriptionStatus::Completed
    );
}
