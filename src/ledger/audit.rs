// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Recompute every account from the journal and report where stored totals
//! disagree with it.

use super::journal;
use crate::error::Result;
use crate::models::{TxKind, TxStatus};
use crate::utils::decimal_at;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub check: &'static str,
    pub account_id: Option<i64>,
    pub referral_id: Option<i64>,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Default)]
struct Totals {
    credits: Decimal,
    debits: Decimal,
    claims: Decimal,
    bonuses: Decimal,
}

pub fn reconcile(conn: &Connection) -> Result<Vec<Discrepancy>> {
    let mut totals: HashMap<i64, Totals> = HashMap::new();
    let mut bonus_entries: HashMap<i64, usize> = HashMap::new();
    for t in journal::list_all(conn)? {
        if t.status != TxStatus::Completed {
            continue;
        }
        let acc = totals.entry(t.account_id).or_default();
        if t.kind.is_credit() {
            acc.credits += t.amount;
        } else {
            acc.debits += t.amount;
        }
        match t.kind {
            TxKind::Claim => acc.claims += t.amount,
            TxKind::ReferralBonus => {
                acc.bonuses += t.amount;
                if let Some(rid) = t.referral_id {
                    *bonus_entries.entry(rid).or_default() += 1;
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT id, balance, total_profit, referral_bonus_total FROM accounts ORDER BY id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            decimal_at(r, 1)?,
            decimal_at(r, 2)?,
            decimal_at(r, 3)?,
        ))
    })?;
    for row in rows {
        let (id, balance, profit, bonus) = row?;
        let t = totals.remove(&id).unwrap_or_default();
        let mut check = |name: &'static str, expected: Decimal, actual: Decimal| {
            if expected != actual {
                out.push(Discrepancy {
                    check: name,
                    account_id: Some(id),
                    referral_id: None,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        };
        check("balance", t.credits - t.debits, balance);
        check("total_profit", t.claims, profit);
        check("referral_bonus_total", t.bonuses, bonus);
        if balance < Decimal::ZERO {
            out.push(Discrepancy {
                check: "negative_balance",
                account_id: Some(id),
                referral_id: None,
                expected: ">= 0".into(),
                actual: balance.to_string(),
            });
        }
    }
    for (orphan, t) in totals {
        out.push(Discrepancy {
            check: "orphan_journal",
            account_id: Some(orphan),
            referral_id: None,
            expected: "0".into(),
            actual: (t.credits - t.debits).to_string(),
        });
    }

    let mut stmt = conn.prepare("SELECT id, referrer_id, is_paid FROM referrals ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, bool>(2)?,
        ))
    })?;
    for row in rows {
        let (id, referrer, paid) = row?;
        let entries = bonus_entries.get(&id).copied().unwrap_or(0);
        let expected = usize::from(paid);
        if entries != expected {
            out.push(Discrepancy {
                check: "referral_payouts",
                account_id: Some(referrer),
                referral_id: Some(id),
                expected: expected.to_string(),
                actual: entries.to_string(),
            });
        }
    }
    Ok(out)
}
