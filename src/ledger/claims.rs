// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Daily accrual claims and the batch sweep that drives them.

use super::accounts::{self, Posting};
use super::journal::Entry;
use super::subscriptions::{self, SUBSCRIPTION_COLUMNS};
use crate::db::begin_write;
use crate::error::{ErrorKind, LedgerError, Result};
use crate::models::{Account, Subscription, SubscriptionStatus, TxKind};
use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outbound messages to account holders. Delivery failures are reported by
/// the sweep and never undo a committed claim.
pub trait Notifier {
    fn claim_credited(
        &self,
        account: &Account,
        subscription: &Subscription,
        amount: Decimal,
    ) -> anyhow::Result<()>;

    fn remind(&self, account: &Account) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn claim_credited(
        &self,
        account: &Account,
        subscription: &Subscription,
        amount: Decimal,
    ) -> anyhow::Result<()> {
        info!(
            "notify {}: subscription {} credited {}",
            account.display_name(),
            subscription.id,
            amount
        );
        Ok(())
    }

    fn remind(&self, account: &Account) -> anyhow::Result<()> {
        info!("remind {}: daily profit is ready to claim", account.display_name());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub subscription: Subscription,
    pub amount: Decimal,
    pub posting: Posting,
}

impl ClaimOutcome {
    pub fn completed(&self) -> bool {
        self.subscription.status == SubscriptionStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub subscription_id: i64,
    pub kind: Option<ErrorKind>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub claimed: usize,
    pub credited: Decimal,
    pub completed: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
    pub notify_failures: Vec<SweepFailure>,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderReport {
    pub sent: usize,
    pub failed: Vec<(i64, String)>,
}

fn check_claimable(sub: &Subscription, as_of: NaiveDate) -> Result<()> {
    if sub.status != SubscriptionStatus::Active || as_of > sub.end_date {
        return Err(LedgerError::SubscriptionNotActive(sub.id));
    }
    if as_of <= sub.start_date {
        return Err(LedgerError::NotYetClaimable {
            id: sub.id,
            first_claim: sub.start_date + Duration::days(1),
        });
    }
    if let Some(last) = sub.last_claim_date {
        if as_of == last {
            return Err(LedgerError::AlreadyClaimedToday {
                id: sub.id,
                date: as_of,
            });
        }
        if as_of < last {
            return Err(LedgerError::ClaimDateRegressed {
                id: sub.id,
                last_claim: last,
                as_of,
            });
        }
    }
    Ok(())
}

/// Credit one day of accrual for `as_of`. The final day of the term also
/// completes the subscription. Nothing is written unless every step succeeds.
pub fn claim(conn: &mut Connection, subscription_id: i64, as_of: NaiveDate) -> Result<ClaimOutcome> {
    let tx = begin_write(conn)?;
    let sub = subscriptions::get(&tx, subscription_id)?;
    check_claimable(&sub, as_of)?;

    let amount = sub.daily_accrual();
    let entry = Entry::new(TxKind::Claim, amount)
        .subscription(sub.id)
        .claim_date(as_of)
        .describe(format!("daily return for {}", as_of));
    let posting = accounts::apply_credit(&tx, sub.account_id, &entry)?;

    let status = if as_of >= sub.end_date {
        SubscriptionStatus::Completed
    } else {
        SubscriptionStatus::Active
    };
    let changed = tx.execute(
        "UPDATE subscriptions SET last_claim_date=?1, status=?2, version=version+1
         WHERE id=?3 AND version=?4",
        params![as_of, status, sub.id, sub.version],
    )?;
    if changed == 0 {
        return Err(LedgerError::Conflict(format!(
            "subscription {} changed concurrently",
            sub.id
        )));
    }
    let subscription = subscriptions::get(&tx, sub.id)?;
    tx.commit()?;

    info!(
        "claim subscription={} account={} date={} amount={} balance={}{}",
        sub.id,
        sub.account_id,
        as_of,
        amount,
        posting.balance,
        if status == SubscriptionStatus::Completed {
            " (completed)"
        } else {
            ""
        }
    );
    Ok(ClaimOutcome {
        subscription,
        amount,
        posting,
    })
}

/// Complete every active subscription whose term ended before `as_of`.
/// Unclaimed days are forfeited; no money moves.
pub fn expire_matured(conn: &mut Connection, as_of: NaiveDate) -> Result<usize> {
    let tx = begin_write(conn)?;
    let changed = tx.execute(
        "UPDATE subscriptions SET status=?1, version=version+1 WHERE status='active' AND end_date < ?2",
        params![SubscriptionStatus::Completed, as_of],
    )?;
    tx.commit()?;
    if changed > 0 {
        info!("{} subscriptions matured before {}", changed, as_of);
    }
    Ok(changed)
}

fn due_for(conn: &Connection, as_of: NaiveDate) -> Result<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE status='active' AND start_date < ?1 AND end_date >= ?1
           AND (last_claim_date IS NULL OR last_claim_date < ?1)
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![as_of], subscriptions::map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Claim every due subscription for `as_of`, one atomic claim at a time.
///
/// Per-subscription errors are collected rather than propagated. `cancel` is
/// checked between subscriptions; an interrupted sweep can simply be run again.
pub fn sweep(
    conn: &mut Connection,
    as_of: NaiveDate,
    notifier: &dyn Notifier,
    cancel: &AtomicBool,
) -> Result<SweepReport> {
    let mut report = SweepReport {
        expired: expire_matured(conn, as_of)?,
        ..Default::default()
    };
    let active = subscriptions::list_active(conn)?;
    let due = due_for(conn, as_of)?;
    report.skipped = active.len().saturating_sub(due.len());
    debug!(
        "sweep {}: {} active, {} due",
        as_of,
        active.len(),
        due.len()
    );

    for sub in due {
        if cancel.load(Ordering::Relaxed) {
            warn!("sweep {} interrupted before subscription {}", as_of, sub.id);
            report.interrupted = true;
            break;
        }
        let outcome = match claim(conn, sub.id, as_of) {
            Ok(o) => o,
            Err(e) => {
                warn!("sweep {}: subscription {} failed: {}", as_of, sub.id, e);
                report.failures.push(SweepFailure {
                    subscription_id: sub.id,
                    kind: Some(e.kind()),
                    error: e.to_string(),
                });
                continue;
            }
        };
        report.claimed += 1;
        report.credited += outcome.amount;
        if outcome.completed() {
            report.completed += 1;
        }

        let delivered = accounts::get(conn, sub.account_id)
            .map_err(anyhow::Error::from)
            .and_then(|acct| notifier.claim_credited(&acct, &outcome.subscription, outcome.amount));
        if let Err(e) = delivered {
            warn!("sweep {}: notify for subscription {} failed: {}", as_of, sub.id, e);
            report.notify_failures.push(SweepFailure {
                subscription_id: sub.id,
                kind: None,
                error: e.to_string(),
            });
        }
    }

    info!(
        "sweep {} done: claimed={} credited={} completed={} expired={} failures={}",
        as_of,
        report.claimed,
        report.credited,
        report.completed,
        report.expired,
        report.failures.len()
    );
    Ok(report)
}

/// Nudge every active account to claim. Sends only; never accrues.
pub fn send_reminders(conn: &Connection, notifier: &dyn Notifier) -> Result<ReminderReport> {
    let mut report = ReminderReport::default();
    for acct in accounts::list_active(conn)? {
        match notifier.remind(&acct) {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("reminder to account {} failed: {}", acct.id, e);
                report.failed.push((acct.id, e.to_string()));
            }
        }
    }
    info!(
        "reminders sent={} failed={}",
        report.sent,
        report.failed.len()
    );
    Ok(report)
}
