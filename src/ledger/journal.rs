// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Append-only log of economic events. Rows are never deleted and only their
//! status moves, from `pending` to a terminal state.

use crate::error::{LedgerError, Result};
use crate::models::{LedgerTransaction, TxKind, TxStatus};
use crate::utils::decimal_at;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

pub(crate) const TX_COLUMNS: &str = "id, account_id, subscription_id, referral_id, type, amount, status, claim_date, description, created_at";

/// A journal entry about to be written alongside a balance change.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: TxKind,
    pub amount: Decimal,
    pub subscription_id: Option<i64>,
    pub referral_id: Option<i64>,
    pub claim_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl Entry {
    pub fn new(kind: TxKind, amount: Decimal) -> Self {
        Self {
            kind,
            amount,
            subscription_id: None,
            referral_id: None,
            claim_date: None,
            description: None,
        }
    }

    pub fn subscription(mut self, id: i64) -> Self {
        self.subscription_id = Some(id);
        self
    }

    pub fn referral(mut self, id: i64) -> Self {
        self.referral_id = Some(id);
        self
    }

    pub fn claim_date(mut self, date: NaiveDate) -> Self {
        self.claim_date = Some(date);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

pub(crate) fn map_row(r: &Row<'_>) -> rusqlite::Result<LedgerTransaction> {
    Ok(LedgerTransaction {
        id: r.get(0)?,
        account_id: r.get(1)?,
        subscription_id: r.get(2)?,
        referral_id: r.get(3)?,
        kind: r.get(4)?,
        amount: decimal_at(r, 5)?,
        status: r.get(6)?,
        claim_date: r.get(7)?,
        description: r.get(8)?,
        created_at: r.get(9)?,
    })
}

/// Append an entry. Callers run this inside the same SQLite transaction as
/// the balance change it describes.
pub(crate) fn append(
    conn: &Connection,
    account_id: i64,
    entry: &Entry,
    status: TxStatus,
) -> Result<LedgerTransaction> {
    conn.execute(
        "INSERT INTO transactions(account_id, subscription_id, referral_id, type, amount, status, claim_date, description)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            account_id,
            entry.subscription_id,
            entry.referral_id,
            entry.kind,
            entry.amount.to_string(),
            status,
            entry.claim_date,
            entry.description,
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<LedgerTransaction> {
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE id=?1");
    conn.query_row(&sql, params![id], map_row)
        .optional()?
        .ok_or(LedgerError::TransactionNotFound(id))
}

/// Move a pending entry to a terminal status. Any other starting status is rejected.
pub(crate) fn settle(conn: &Connection, id: i64, status: TxStatus) -> Result<LedgerTransaction> {
    let changed = conn.execute(
        "UPDATE transactions SET status=?1, updated_at=datetime('now') WHERE id=?2 AND status='pending'",
        params![status, id],
    )?;
    if changed == 0 {
        let current = get(conn, id)?;
        return Err(LedgerError::TransactionNotPending {
            id,
            status: current.status.to_string(),
        });
    }
    get(conn, id)
}

pub fn list_for_account(conn: &Connection, account_id: i64) -> Result<Vec<LedgerTransaction>> {
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE account_id=?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_id], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn list_all(conn: &Connection) -> Result<Vec<LedgerTransaction>> {
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
