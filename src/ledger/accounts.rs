// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Account store: the only code that writes balance, profit and bonus totals.
//!
//! Every balance change is committed together with exactly one journal row.
//! Writers run inside an IMMEDIATE transaction and additionally compare-and-swap
//! on `accounts.version`, so a lost race shows up as [`LedgerError::Conflict`]
//! instead of a silently overwritten balance.

use super::journal::{self, Entry};
use super::referrals;
use crate::config::LedgerSettings;
use crate::db::begin_write;
use crate::error::{LedgerError, Result};
use crate::models::{Account, LedgerTransaction, ReferralRecord, TxKind, TxStatus};
use crate::utils::{decimal_at, generate_referral_code};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

pub(crate) const ACCOUNT_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, referral_code, referred_by, balance, total_profit, referral_bonus_total, is_active, version, created_at";
const CODE_ATTEMPTS: usize = 16;

/// Balance after a committed debit or credit, with the journal row describing it.
#[derive(Debug, Clone)]
pub struct Posting {
    pub balance: Decimal,
    pub transaction: LedgerTransaction,
}

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub referral: Option<ReferralRecord>,
    pub bonus: Option<Posting>,
}

pub(crate) fn map_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        telegram_id: r.get(1)?,
        username: r.get(2)?,
        first_name: r.get(3)?,
        last_name: r.get(4)?,
        referral_code: r.get(5)?,
        referred_by: r.get(6)?,
        balance: decimal_at(r, 7)?,
        total_profit: decimal_at(r, 8)?,
        referral_bonus_total: decimal_at(r, 9)?,
        active: r.get(10)?,
        version: r.get(11)?,
        created_at: r.get(12)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Account> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id=?1");
    conn.query_row(&sql, params![id], map_row)
        .optional()?
        .ok_or(LedgerError::AccountNotFound(id))
}

pub fn find_by_telegram_id(conn: &Connection, telegram_id: i64) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE telegram_id=?1");
    Ok(conn.query_row(&sql, params![telegram_id], map_row).optional()?)
}

pub fn find_by_referral_code(conn: &Connection, code: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE referral_code=?1");
    Ok(conn.query_row(&sql, params![code], map_row).optional()?)
}

pub fn list_active(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active=1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Apply a signed balance change for `kind` to the stored account, returning
/// the new balance. Does not write the journal; callers that need the journal
/// row to reference something created after the debit append it themselves.
pub(crate) fn adjust(conn: &Connection, account_id: i64, kind: TxKind, amount: Decimal) -> Result<Decimal> {
    ensure_positive(amount)?;
    let acct = get(conn, account_id)?;
    let mut profit = acct.total_profit;
    let mut bonus = acct.referral_bonus_total;
    let balance = if kind.is_credit() {
        match kind {
            TxKind::Claim => profit += amount,
            TxKind::ReferralBonus => bonus += amount,
            _ => {}
        }
        acct.balance + amount
    } else {
        if acct.balance < amount {
            return Err(LedgerError::insufficient(acct.balance, amount));
        }
        acct.balance - amount
    };

    let changed = conn.execute(
        "UPDATE accounts SET balance=?1, total_profit=?2, referral_bonus_total=?3, version=version+1
         WHERE id=?4 AND version=?5",
        params![
            balance.to_string(),
            profit.to_string(),
            bonus.to_string(),
            account_id,
            acct.version
        ],
    )?;
    if changed == 0 {
        return Err(LedgerError::Conflict(format!(
            "account {} changed concurrently",
            account_id
        )));
    }
    Ok(balance)
}

/// Debit inside the caller's transaction and journal it as completed.
pub(crate) fn apply_debit(conn: &Connection, account_id: i64, entry: &Entry) -> Result<Posting> {
    if entry.kind.is_credit() {
        return Err(LedgerError::validation(format!(
            "{} is not a debit",
            entry.kind
        )));
    }
    let balance = adjust(conn, account_id, entry.kind, entry.amount)?;
    let transaction = journal::append(conn, account_id, entry, TxStatus::Completed)?;
    Ok(Posting {
        balance,
        transaction,
    })
}

/// Credit inside the caller's transaction and journal it as completed.
pub(crate) fn apply_credit(conn: &Connection, account_id: i64, entry: &Entry) -> Result<Posting> {
    if !entry.kind.is_credit() {
        return Err(LedgerError::validation(format!(
            "{} is not a credit",
            entry.kind
        )));
    }
    let balance = adjust(conn, account_id, entry.kind, entry.amount)?;
    let transaction = journal::append(conn, account_id, entry, TxStatus::Completed)?;
    Ok(Posting {
        balance,
        transaction,
    })
}

pub fn debit(
    conn: &mut Connection,
    account_id: i64,
    amount: Decimal,
    kind: TxKind,
) -> Result<Posting> {
    let tx = begin_write(conn)?;
    let posting = apply_debit(&tx, account_id, &Entry::new(kind, amount))?;
    tx.commit()?;
    info!(
        "debit account={} kind={} amount={} balance={}",
        account_id, kind, amount, posting.balance
    );
    Ok(posting)
}

pub fn credit(
    conn: &mut Connection,
    account_id: i64,
    amount: Decimal,
    kind: TxKind,
) -> Result<Posting> {
    let tx = begin_write(conn)?;
    let posting = apply_credit(&tx, account_id, &Entry::new(kind, amount))?;
    tx.commit()?;
    info!(
        "credit account={} kind={} amount={} balance={}",
        account_id, kind, amount, posting.balance
    );
    Ok(posting)
}

/// Manual top-up recorded by an administrator.
pub fn deposit(
    conn: &mut Connection,
    account_id: i64,
    amount: Decimal,
    note: Option<&str>,
) -> Result<Posting> {
    let tx = begin_write(conn)?;
    let mut entry = Entry::new(TxKind::Deposit, amount);
    entry.description = note.map(str::to_string);
    let posting = apply_credit(&tx, account_id, &entry)?;
    tx.commit()?;
    info!(
        "deposit account={} amount={} balance={}",
        account_id, amount, posting.balance
    );
    Ok(posting)
}

/// Record a pending withdrawal. The balance moves only when it is approved.
pub fn request_withdrawal(
    conn: &mut Connection,
    account_id: i64,
    amount: Decimal,
) -> Result<LedgerTransaction> {
    ensure_positive(amount)?;
    let tx = begin_write(conn)?;
    let acct = get(&tx, account_id)?;
    if !acct.active {
        return Err(LedgerError::AccountInactive(account_id));
    }
    if acct.balance < amount {
        return Err(LedgerError::insufficient(acct.balance, amount));
    }
    let entry = Entry::new(TxKind::Withdraw, amount);
    let record = journal::append(&tx, account_id, &entry, TxStatus::Pending)?;
    tx.commit()?;
    info!(
        "withdrawal requested tx={} account={} amount={}",
        record.id, account_id, amount
    );
    Ok(record)
}

/// Approve or reject a pending withdrawal. An approval that finds the balance
/// short marks the request failed instead of overdrawing.
pub fn settle_withdrawal(
    conn: &mut Connection,
    transaction_id: i64,
    approve: bool,
) -> Result<LedgerTransaction> {
    let tx = begin_write(conn)?;
    let pending = journal::get(&tx, transaction_id)?;
    if pending.kind != TxKind::Withdraw {
        return Err(LedgerError::validation(format!(
            "transaction {} is a {}, not a withdrawal",
            transaction_id, pending.kind
        )));
    }
    if pending.status != TxStatus::Pending {
        return Err(LedgerError::TransactionNotPending {
            id: transaction_id,
            status: pending.status.to_string(),
        });
    }

    let settled = if !approve {
        journal::settle(&tx, transaction_id, TxStatus::Cancelled)?
    } else {
        match adjust(&tx, pending.account_id, TxKind::Withdraw, pending.amount) {
            Ok(_) => journal::settle(&tx, transaction_id, TxStatus::Completed)?,
            Err(LedgerError::InsufficientFunds { shortfall, .. }) => {
                warn!(
                    "withdrawal tx={} failed: account {} short by {}",
                    transaction_id, pending.account_id, shortfall
                );
                journal::settle(&tx, transaction_id, TxStatus::Failed)?
            }
            Err(e) => return Err(e),
        }
    };
    tx.commit()?;
    info!(
        "withdrawal tx={} settled as {}",
        transaction_id, settled.status
    );
    Ok(settled)
}

/// Soft (de)activation; accounts are never deleted.
pub fn set_active(conn: &mut Connection, account_id: i64, active: bool) -> Result<Account> {
    let tx = begin_write(conn)?;
    let changed = tx.execute(
        "UPDATE accounts SET is_active=?1, version=version+1 WHERE id=?2",
        params![active, account_id],
    )?;
    if changed == 0 {
        return Err(LedgerError::AccountNotFound(account_id));
    }
    let acct = get(&tx, account_id)?;
    tx.commit()?;
    info!("account {} active={}", account_id, active);
    Ok(acct)
}

fn unused_referral_code(conn: &Connection) -> Result<String> {
    let mut rng = rand::thread_rng();
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_referral_code(&mut rng);
        if find_by_referral_code(conn, &code)?.is_none() {
            return Ok(code);
        }
    }
    Err(LedgerError::Conflict(
        "could not allocate an unused referral code".into(),
    ))
}

/// Create an account with zero balances. When `referrer_code` is given the
/// referral is recorded and its bonus paid in the same transaction, so a bad
/// code leaves no account behind.
pub fn register(
    conn: &mut Connection,
    settings: &LedgerSettings,
    new: &NewAccount,
    referrer_code: Option<&str>,
) -> Result<Registration> {
    if new.telegram_id <= 0 {
        return Err(LedgerError::validation(format!(
            "telegram id must be positive, got {}",
            new.telegram_id
        )));
    }
    let tx = begin_write(conn)?;
    if find_by_telegram_id(&tx, new.telegram_id)?.is_some() {
        return Err(LedgerError::DuplicateAccount(new.telegram_id));
    }
    let code = unused_referral_code(&tx)?;
    tx.execute(
        "INSERT INTO accounts(telegram_id, username, first_name, last_name, referral_code)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            new.telegram_id,
            new.username,
            new.first_name,
            new.last_name,
            code
        ],
    )?;
    let account_id = tx.last_insert_rowid();

    let (referral, bonus) = match referrer_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let record = referrals::attach(&tx, settings, code, account_id)?;
            let (paid, posting) = referrals::apply_payout(&tx, record.id)?;
            (Some(paid), Some(posting))
        }
        None => (None, None),
    };
    let account = get(&tx, account_id)?;
    tx.commit()?;
    info!(
        "registered account={} telegram_id={} code={} referred_by={:?}",
        account.id, account.telegram_id, account.referral_code, account.referred_by
    );
    Ok(Registration {
        account,
        referral,
        bonus,
    })
}
