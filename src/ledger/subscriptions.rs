// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::accounts::{self, Posting};
use super::catalog;
use super::journal::{self, Entry};
use crate::db::begin_write;
use crate::error::{LedgerError, Result};
use crate::models::{Subscription, SubscriptionStatus, TxKind, TxStatus};
use crate::utils::decimal_at;
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub(crate) const SUBSCRIPTION_COLUMNS: &str = "id, account_id, package_id, principal, daily_return_rate, duration_days, start_date, end_date, last_claim_date, status, version";

#[derive(Debug, Clone)]
pub struct Purchase {
    pub subscription: Subscription,
    pub posting: Posting,
}

/// What buying a package would do to an account, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub package_id: i64,
    pub price: Decimal,
    pub balance: Decimal,
    pub balance_after: Decimal,
    pub shortfall: Decimal,
    pub daily_accrual: Decimal,
    pub total_return: Decimal,
}

pub(crate) fn map_row(r: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: r.get(0)?,
        account_id: r.get(1)?,
        package_id: r.get(2)?,
        principal: decimal_at(r, 3)?,
        daily_return_rate: decimal_at(r, 4)?,
        duration_days: r.get(5)?,
        start_date: r.get(6)?,
        end_date: r.get(7)?,
        last_claim_date: r.get(8)?,
        status: r.get(9)?,
        version: r.get(10)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Subscription> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id=?1");
    conn.query_row(&sql, params![id], map_row)
        .optional()?
        .ok_or(LedgerError::SubscriptionNotFound(id))
}

pub fn list_for_account(conn: &Connection, account_id: i64) -> Result<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE account_id=?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_id], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn list_active(conn: &Connection) -> Result<Vec<Subscription>> {
    let sql =
        format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE status='active' ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn quote(conn: &Connection, account_id: i64, package_id: i64) -> Result<Quote> {
    let acct = accounts::get(conn, account_id)?;
    let pkg = catalog::get(conn, package_id)?;
    let daily = crate::models::accrual(pkg.price, pkg.daily_return_rate);
    Ok(Quote {
        package_id,
        price: pkg.price,
        balance: acct.balance,
        balance_after: acct.balance - pkg.price,
        shortfall: (pkg.price - acct.balance).max(Decimal::ZERO),
        daily_accrual: daily,
        total_return: daily * Decimal::from(pkg.duration_days),
    })
}

/// Buy a package: debit the price, open a subscription on a snapshot of the
/// package terms, and journal the purchase. All of it commits or none of it.
pub fn purchase(
    conn: &mut Connection,
    account_id: i64,
    package_id: i64,
    as_of: NaiveDate,
) -> Result<Purchase> {
    let tx = begin_write(conn)?;
    let pkg = catalog::get(&tx, package_id)?;
    if !pkg.active {
        return Err(LedgerError::PackageInactive(package_id));
    }
    let acct = accounts::get(&tx, account_id)?;
    if !acct.active {
        return Err(LedgerError::AccountInactive(account_id));
    }
    if acct.balance < pkg.price {
        warn!(
            "purchase rejected account={} package={}: balance {} < price {}",
            account_id, package_id, acct.balance, pkg.price
        );
        return Err(LedgerError::insufficient(acct.balance, pkg.price));
    }

    // the debit goes first; a failure anywhere below rolls it back with the transaction
    let balance = accounts::adjust(&tx, account_id, TxKind::Purchase, pkg.price)?;

    let end_date = as_of + Duration::days(i64::from(pkg.duration_days));
    tx.execute(
        "INSERT INTO subscriptions(account_id, package_id, principal, daily_return_rate, duration_days, start_date, end_date, status)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            account_id,
            package_id,
            pkg.price.to_string(),
            pkg.daily_return_rate.to_string(),
            pkg.duration_days,
            as_of,
            end_date,
            SubscriptionStatus::Active
        ],
    )?;
    let subscription = get(&tx, tx.last_insert_rowid())?;

    let entry = Entry::new(TxKind::Purchase, pkg.price)
        .subscription(subscription.id)
        .describe(format!("purchase of package '{}'", pkg.name));
    let transaction = journal::append(&tx, account_id, &entry, TxStatus::Completed)?;
    tx.commit()?;

    info!(
        "purchase account={} package={} subscription={} price={} balance={}",
        account_id, package_id, subscription.id, pkg.price, balance
    );
    Ok(Purchase {
        subscription,
        posting: Posting {
            balance,
            transaction,
        },
    })
}

/// Stop accrual on an active subscription. No money moves.
pub fn cancel(conn: &mut Connection, id: i64) -> Result<Subscription> {
    let tx = begin_write(conn)?;
    let sub = get(&tx, id)?;
    if sub.status != SubscriptionStatus::Active {
        return Err(LedgerError::SubscriptionNotActive(id));
    }
    set_status(&tx, &sub, SubscriptionStatus::Cancelled)?;
    let sub = get(&tx, id)?;
    tx.commit()?;
    info!("subscription {} cancelled", id);
    Ok(sub)
}

/// Compare-and-swap status change on the row version read earlier.
pub(crate) fn set_status(
    conn: &Connection,
    sub: &Subscription,
    status: SubscriptionStatus,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE subscriptions SET status=?1, version=version+1 WHERE id=?2 AND version=?3",
        params![status, sub.id, sub.version],
    )?;
    if changed == 0 {
        return Err(LedgerError::Conflict(format!(
            "subscription {} changed concurrently",
            sub.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerSettings;
    use crate::db::open_in_memory;
    use crate::ledger::accounts::NewAccount;
    use crate::ledger::catalog::PackageDraft;

    fn fixture(conn: &mut Connection) -> (i64, i64) {
        let settings = LedgerSettings::default();
        let acct = accounts::register(
            conn,
            &settings,
            &NewAccount {
                telegram_id: 42,
                ..Default::default()
            },
            None,
        )
        .unwrap()
        .account;
        accounts::deposit(conn, acct.id, Decimal::from(100_000), None).unwrap();
        let pkg = catalog::create(
            conn,
            &settings,
            &PackageDraft {
                name: "Silver".into(),
                description: None,
                price: Decimal::from(80_000),
                duration_days: 10,
                daily_return_rate: Decimal::from_str_exact("0.02").unwrap(),
            },
        )
        .unwrap();
        (acct.id, pkg.id)
    }

    #[test]
    fn quote_reports_shortfall_and_return() {
        let mut conn = open_in_memory().unwrap();
        let (acct, pkg) = fixture(&mut conn);
        let q = quote(&conn, acct, pkg).unwrap();
        assert_eq!(q.balance_after, Decimal::from(20_000));
        assert_eq!(q.shortfall, Decimal::ZERO);
        assert_eq!(q.daily_accrual, Decimal::from(1_600));
        assert_eq!(q.total_return, Decimal::from(16_000));
    }

    #[test]
    fn cancel_only_active() {
        let mut conn = open_in_memory().unwrap();
        let (acct, pkg) = fixture(&mut conn);
        let day0 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let bought = purchase(&mut conn, acct, pkg, day0).unwrap();
        let cancelled = cancel(&mut conn, bought.subscription.id).unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(matches!(
            cancel(&mut conn, bought.subscription.id),
            Err(LedgerError::SubscriptionNotActive(_))
        ));
        // cancellation does not refund
        assert_eq!(accounts::get(&conn, acct).unwrap().balance, Decimal::from(20_000));
    }

    #[test]
    fn inactive_account_cannot_buy() {
        let mut conn = open_in_memory().unwrap();
        let (acct, pkg) = fixture(&mut conn);
        accounts::set_active(&mut conn, acct, false).unwrap();
        let day0 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            purchase(&mut conn, acct, pkg, day0),
            Err(LedgerError::AccountInactive(_))
        ));
    }
}
