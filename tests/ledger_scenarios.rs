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
use investledger::ledger::{audit, claims, journal, referrals, subscriptions};
use investledger::models::{SubscriptionStatus, TxKind, TxStatus};
use investledger::{ErrorKind, LedgerError};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn day0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn account(conn: &mut Connection, telegram_id: i64, funds: &str) -> i64 {
    let id = accounts::register(
        conn,
        &LedgerSettings::default(),
        &NewAccount {
            telegram_id,
            first_name: Some(format!("User {telegram_id}")),
            ..Default::default()
        },
        None,
    )
    .unwrap()
    .account
    .id;
    if dec(funds) > Decimal::ZERO {
        accounts::deposit(conn, id, dec(funds), Some("seed")).unwrap();
    }
    id
}

fn silver(conn: &Connection) -> i64 {
    catalog::create(
        conn,
        &LedgerSettings::default(),
        &PackageDraft {
            name: "Silver".into(),
            description: Some("10 days at 2%".into()),
            price: dec("80000"),
            duration_days: 10,
            daily_return_rate: dec("0.02"),
        },
    )
    .unwrap()
    .id
}

#[test]
fn purchase_debits_price_and_opens_subscription() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 100, "100000");
    let pkg = silver(&conn);

    let bought = subscriptions::purchase(&mut conn, acct, pkg, day0()).unwrap();
    assert_eq!(bought.posting.balance, dec("20000"));
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("20000"));

    let subs = subscriptions::list_for_account(&conn, acct).unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].principal, dec("80000"));
    assert_eq!(subs[0].daily_return_rate, dec("0.02"));
    assert_eq!(subs[0].end_date, day0() + Duration::days(10));
    assert_eq!(subs[0].status, SubscriptionStatus::Active);

    let purchases: Vec<_> = journal::list_for_account(&conn, acct)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TxKind::Purchase)
        .collect();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].amount, dec("80000"));
    assert_eq!(purchases[0].status, TxStatus::Completed);
    assert_eq!(purchases[0].subscription_id, Some(subs[0].id));
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn purchase_reports_shortfall() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 101, "50000");
    let pkg = silver(&conn);

    let err = subscriptions::purchase(&mut conn, acct, pkg, day0()).unwrap_err();
    match err {
        LedgerError::InsufficientFunds {
            balance,
            required,
            shortfall,
        } => {
            assert_eq!(balance, dec("50000"));
            assert_eq!(required, dec("80000"));
            assert_eq!(shortfall, dec("30000"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(subscriptions::list_for_account(&conn, acct).unwrap().is_empty());
}

#[test]
fn purchase_rejects_missing_and_inactive_packages() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 102, "100000");
    let pkg = silver(&conn);
    assert!(matches!(
        subscriptions::purchase(&mut conn, acct, 999, day0()),
        Err(LedgerError::PackageNotFound(999))
    ));
    catalog::set_active(&conn, pkg, false).unwrap();
    let err = subscriptions::purchase(&mut conn, acct, pkg, day0()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("100000"));
}

#[test]
fn purchase_is_all_or_nothing() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 103, "100000");
    let pkg = silver(&conn);
    // fail the subscription insert, which runs after the debit
    conn.execute_batch(
        "CREATE TRIGGER fail_subscription BEFORE INSERT ON subscriptions
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
    )
    .unwrap();

    assert!(subscriptions::purchase(&mut conn, acct, pkg, day0()).is_err());
    let after = accounts::get(&conn, acct).unwrap();
    assert_eq!(after.balance, dec("100000"));
    assert_eq!(after.version, 1);
    assert!(subscriptions::list_for_account(&conn, acct).unwrap().is_empty());
    assert_eq!(journal::list_for_account(&conn, acct).unwrap().len(), 1);

    conn.execute_batch("DROP TRIGGER fail_subscription;").unwrap();
    subscriptions::purchase(&mut conn, acct, pkg, day0()).unwrap();
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("20000"));
}

#[test]
fn daily_claim_credits_once_per_day() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 104, "100000");
    let pkg = silver(&conn);
    let sub = subscriptions::purchase(&mut conn, acct, pkg, day0())
        .unwrap()
        .subscription;
    let day1 = day0() + Duration::days(1);

    let out = claims::claim(&mut conn, sub.id, day1).unwrap();
    assert_eq!(out.amount, dec("1600"));
    assert_eq!(out.posting.balance, dec("21600"));
    assert_eq!(out.subscription.last_claim_date, Some(day1));
    let a = accounts::get(&conn, acct).unwrap();
    assert_eq!(a.total_profit, dec("1600"));

    let again = claims::claim(&mut conn, sub.id, day1).unwrap_err();
    assert!(matches!(again, LedgerError::AlreadyClaimedToday { .. }));
    assert_eq!(again.kind(), ErrorKind::Duplicate);
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("21600"));

    let claim_rows = journal::list_for_account(&conn, acct)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TxKind::Claim)
        .count();
    assert_eq!(claim_rows, 1);
}

#[test]
fn claim_on_end_date_completes_and_later_claims_fail() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 105, "100000");
    let pkg = silver(&conn);
    let sub = subscriptions::purchase(&mut conn, acct, pkg, day0())
        .unwrap()
        .subscription;

    for n in 1..=9 {
        let out = claims::claim(&mut conn, sub.id, day0() + Duration::days(n)).unwrap();
        assert!(!out.completed());
    }
    let last = claims::claim(&mut conn, sub.id, sub.end_date).unwrap();
    assert!(last.completed());
    assert_eq!(last.subscription.status, SubscriptionStatus::Completed);

    let late = claims::claim(&mut conn, sub.id, sub.end_date + Duration::days(1));
    assert!(matches!(late, Err(LedgerError::SubscriptionNotActive(_))));

    let a = accounts::get(&conn, acct).unwrap();
    assert_eq!(a.total_profit, dec("16000"));
    assert_eq!(a.balance, dec("36000"));
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn claims_before_start_or_backwards_are_rejected() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 106, "100000");
    let pkg = silver(&conn);
    let sub = subscriptions::purchase(&mut conn, acct, pkg, day0())
        .unwrap()
        .subscription;

    assert!(matches!(
        claims::claim(&mut conn, sub.id, day0()),
        Err(LedgerError::NotYetClaimable { .. })
    ));
    claims::claim(&mut conn, sub.id, day0() + Duration::days(3)).unwrap();
    assert!(matches!(
        claims::claim(&mut conn, sub.id, day0() + Duration::days(2)),
        Err(LedgerError::ClaimDateRegressed { .. })
    ));
    assert!(matches!(
        claims::claim(&mut conn, 4242, day0()),
        Err(LedgerError::SubscriptionNotFound(4242))
    ));
}

#[test]
fn referral_code_pays_referrer_once() {
    let mut conn = db::open_in_memory().unwrap();
    let settings = LedgerSettings::default();
    let referrer = account(&mut conn, 200, "0");
    conn.execute(
        "UPDATE accounts SET referral_code='ABCD1234' WHERE id=?1",
        params![referrer],
    )
    .unwrap();

    let reg = accounts::register(
        &mut conn,
        &settings,
        &NewAccount {
            telegram_id: 201,
            ..Default::default()
        },
        Some("ABCD1234"),
    )
    .unwrap();
    let record = reg.referral.expect("referral recorded");
    assert!(record.paid);
    assert_eq!(record.referrer_id, referrer);
    assert_eq!(reg.account.referred_by, Some(referrer));

    let r = accounts::get(&conn, referrer).unwrap();
    assert_eq!(r.referral_bonus_total, settings.referral_bonus);
    assert_eq!(r.balance, settings.referral_bonus);
    assert_eq!(referrals::list_for_referrer(&conn, referrer).unwrap().len(), 1);

    let dup = referrals::register_referral(&mut conn, &settings, "ABCD1234", reg.account.id);
    assert!(matches!(dup, Err(LedgerError::DuplicateReferral { .. })));
    assert!(matches!(
        referrals::pay_bonus(&mut conn, record.id),
        Err(LedgerError::AlreadyPaid(_))
    ));
    assert_eq!(
        accounts::get(&conn, referrer).unwrap().referral_bonus_total,
        settings.referral_bonus
    );
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn registration_with_unknown_code_leaves_no_account() {
    let mut conn = db::open_in_memory().unwrap();
    let err = accounts::register(
        &mut conn,
        &LedgerSettings::default(),
        &NewAccount {
            telegram_id: 300,
            ..Default::default()
        },
        Some("NOPE0000"),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidReferralCode(_)));
    assert!(accounts::find_by_telegram_id(&conn, 300).unwrap().is_none());
}

#[test]
fn withdrawal_lifecycle() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 400, "1000");

    let pending = accounts::request_withdrawal(&mut conn, acct, dec("600")).unwrap();
    assert_eq!(pending.status, TxStatus::Pending);
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("1000"));

    let rejected = accounts::request_withdrawal(&mut conn, acct, dec("300")).unwrap();
    let rejected = accounts::settle_withdrawal(&mut conn, rejected.id, false).unwrap();
    assert_eq!(rejected.status, TxStatus::Cancelled);

    let done = accounts::settle_withdrawal(&mut conn, pending.id, true).unwrap();
    assert_eq!(done.status, TxStatus::Completed);
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("400"));
    assert!(matches!(
        accounts::settle_withdrawal(&mut conn, pending.id, true),
        Err(LedgerError::TransactionNotPending { .. })
    ));

    // approved after the funds were spent elsewhere: fails instead of overdrawing
    let late = accounts::request_withdrawal(&mut conn, acct, dec("400")).unwrap();
    accounts::debit(&mut conn, acct, dec("100"), TxKind::Withdraw).unwrap();
    let failed = accounts::settle_withdrawal(&mut conn, late.id, true).unwrap();
    assert_eq!(failed.status, TxStatus::Failed);
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("300"));
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn package_edits_do_not_touch_open_subscriptions() {
    let mut conn = db::open_in_memory().unwrap();
    let acct = account(&mut conn, 500, "100000");
    let pkg = silver(&conn);
    let sub = subscriptions::purchase(&mut conn, acct, pkg, day0())
        .unwrap()
        .subscription;
    catalog::update(
        &conn,
        &LedgerSettings::default(),
        pkg,
        &PackageDraft {
            name: "Silver Plus".into(),
            description: None,
            price: dec("90000"),
            duration_days: 20,
            daily_return_rate: dec("0.05"),
        },
    )
    .unwrap();
    let out = claims::claim(&mut conn, sub.id, day0() + Duration::days(1)).unwrap();
    assert_eq!(out.amount, dec("1600"));
    assert_eq!(out.subscription.end_date, sub.end_date);
}

#[test]
fn offerings_that_accrue_under_a_cent_are_refused() {
    let mut conn = db::open_in_memory().unwrap();
    let settings = LedgerSettings::default();
    let acct = account(&mut conn, 400, "1");
    let tiny = PackageDraft {
        name: "Penny".into(),
        description: None,
        price: dec("0.10"),
        duration_days: 10,
        daily_return_rate: dec("0.02"),
    };
    let err = catalog::create(&conn, &settings, &tiny).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(catalog::list(&conn, false).unwrap().is_empty());

    let pkg = silver(&conn);
    let err = catalog::update(&conn, &settings, pkg, &tiny).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(catalog::get(&conn, pkg).unwrap().price, dec("80000"));

    // the smallest accepted terms still claim every day and complete on the end date
    let cent = catalog::create(
        &conn,
        &settings,
        &PackageDraft {
            price: dec("0.50"),
            ..tiny
        },
    )
    .unwrap();
    let sub = subscriptions::purchase(&mut conn, acct, cent.id, day0())
        .unwrap()
        .subscription
        .id;
    let first = claims::claim(&mut conn, sub, day0() + Duration::days(1)).unwrap();
    assert_eq!(first.amount, dec("0.01"));
    let last = claims::claim(&mut conn, sub, day0() + Duration::days(10)).unwrap();
    assert!(last.completed());
    assert_eq!(accounts::get(&conn, acct).unwrap().balance, dec("0.52"));
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}

#[test]
fn registering_a_referral_pays_the_referrer() {
    let mut conn = db::open_in_memory().unwrap();
    let settings = LedgerSettings::default();
    let referrer = account(&mut conn, 500, "0");
    let referred = account(&mut conn, 501, "0");
    let code = accounts::get(&conn, referrer).unwrap().referral_code;

    let (record, posting) =
        referrals::register_referral(&mut conn, &settings, &code, referred).unwrap();
    assert!(record.paid);
    assert_eq!(posting.balance, settings.referral_bonus);
    let r = accounts::get(&conn, referrer).unwrap();
    assert_eq!(r.referral_bonus_total, settings.referral_bonus);
    assert_eq!(r.balance, settings.referral_bonus);
    assert!(matches!(
        referrals::pay_bonus(&mut conn, record.id),
        Err(LedgerError::AlreadyPaid(_))
    ));
    assert!(audit::reconcile(&conn).unwrap().is_empty());
}
