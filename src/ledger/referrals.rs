// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::accounts::{self, Posting};
use super::journal::Entry;
use crate::config::LedgerSettings;
use crate::db::begin_write;
use crate::error::{LedgerError, Result};
use crate::models::{ReferralRecord, TxKind};
use crate::utils::{decimal_at, is_valid_referral_code};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referred_id, bonus_amount, is_paid, paid_at, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub total_referrals: i64,
    pub paid_referrals: i64,
    pub total_bonus: Decimal,
}

fn map_row(r: &Row<'_>) -> rusqlite::Result<ReferralRecord> {
    Ok(ReferralRecord {
        id: r.get(0)?,
        referrer_id: r.get(1)?,
        referred_id: r.get(2)?,
        bonus_amount: decimal_at(r, 3)?,
        paid: r.get(4)?,
        paid_at: r.get(5)?,
        created_at: r.get(6)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<ReferralRecord> {
    let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE id=?1");
    conn.query_row(&sql, params![id], map_row)
        .optional()?
        .ok_or(LedgerError::ReferralNotFound(id))
}

pub fn list_for_referrer(conn: &Connection, referrer_id: i64) -> Result<Vec<ReferralRecord>> {
    let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id=?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![referrer_id], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn summary(conn: &Connection, account_id: i64) -> Result<ReferralSummary> {
    let acct = accounts::get(conn, account_id)?;
    let (total, paid): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_paid),0) FROM referrals WHERE referrer_id=?1",
        params![account_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(ReferralSummary {
        referral_code: acct.referral_code,
        total_referrals: total,
        paid_referrals: paid,
        total_bonus: acct.referral_bonus_total,
    })
}

/// Validate `referrer_code` and insert an unpaid record inside the caller's transaction.
pub(crate) fn attach(
    conn: &Connection,
    settings: &LedgerSettings,
    referrer_code: &str,
    referred_id: i64,
) -> Result<ReferralRecord> {
    let code = referrer_code.trim();
    if !is_valid_referral_code(code) {
        return Err(LedgerError::InvalidReferralCode(code.to_string()));
    }
    let referrer = accounts::find_by_referral_code(conn, code)?
        .ok_or_else(|| LedgerError::InvalidReferralCode(code.to_string()))?;
    let referred = accounts::get(conn, referred_id)?;
    if referrer.id == referred.id {
        return Err(LedgerError::SelfReferral(referred.id));
    }
    if !referrer.active {
        return Err(LedgerError::AccountInactive(referrer.id));
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT referrer_id FROM referrals WHERE referred_id=?1",
            params![referred.id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(prior_referrer) = existing {
        return Err(LedgerError::DuplicateReferral {
            referrer: prior_referrer,
            referred: referred.id,
        });
    }

    conn.execute(
        "INSERT INTO referrals(referrer_id, referred_id, bonus_amount) VALUES (?1,?2,?3)",
        params![
            referrer.id,
            referred.id,
            settings.referral_bonus.to_string()
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE accounts SET referred_by=?1 WHERE id=?2",
        params![referrer.id, referred.id],
    )?;
    get(conn, id)
}

/// Flip `paid` and credit the referrer inside the caller's transaction.
///
/// The flip is conditional on `is_paid = 0`; a second caller that got past its
/// own read still changes zero rows and gets [`LedgerError::AlreadyPaid`].
pub(crate) fn apply_payout(conn: &Connection, referral_id: i64) -> Result<(ReferralRecord, Posting)> {
    let record = get(conn, referral_id)?;
    if record.paid {
        return Err(LedgerError::AlreadyPaid(referral_id));
    }
    let flipped = conn.execute(
        "UPDATE referrals SET is_paid=1, paid_at=datetime('now') WHERE id=?1 AND is_paid=0",
        params![referral_id],
    )?;
    if flipped == 0 {
        return Err(LedgerError::AlreadyPaid(referral_id));
    }
    let entry = Entry::new(TxKind::ReferralBonus, record.bonus_amount)
        .referral(referral_id)
        .describe(format!("referral bonus for account {}", record.referred_id));
    let posting = accounts::apply_credit(conn, record.referrer_id, &entry)?;
    Ok((get(conn, referral_id)?, posting))
}

/// Record that `referred_account_id` joined through `referrer_code` and pay
/// the referrer's bonus in the same transaction. [`pay_bonus`] remains for
/// records that were stored unpaid.
pub fn register_referral(
    conn: &mut Connection,
    settings: &LedgerSettings,
    referrer_code: &str,
    referred_account_id: i64,
) -> Result<(ReferralRecord, Posting)> {
    let tx = begin_write(conn)?;
    let (record, posting) = match attach(&tx, settings, referrer_code, referred_account_id)
        .and_then(|r| apply_payout(&tx, r.id))
    {
        Ok(paid) => paid,
        Err(e) => {
            warn!(
                "referral rejected code={} referred={}: {}",
                referrer_code, referred_account_id, e
            );
            return Err(e);
        }
    };
    tx.commit()?;
    info!(
        "referral {} recorded referrer={} referred={} bonus={} paid",
        record.id, record.referrer_id, record.referred_id, record.bonus_amount
    );
    Ok((record, posting))
}

/// Pay a referral bonus at most once.
pub fn pay_bonus(conn: &mut Connection, referral_id: i64) -> Result<(ReferralRecord, Posting)> {
    let tx = begin_write(conn)?;
    let (record, posting) = apply_payout(&tx, referral_id)?;
    tx.commit()?;
    info!(
        "referral {} bonus {} paid to account {}",
        referral_id, record.bonus_amount, record.referrer_id
    );
    Ok((record, posting))
}
