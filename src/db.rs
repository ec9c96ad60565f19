// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::DatabaseSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Investledger", "investledger"));

pub fn db_path(settings: &DatabaseSettings) -> Result<PathBuf> {
    if let Some(path) = &settings.path {
        return Ok(path.clone());
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("investledger.sqlite"))
}

pub fn open_or_init(settings: &DatabaseSettings) -> Result<Connection> {
    let path = db_path(settings)?;
    open_at(&path, settings.busy_timeout_ms)
}

/// Open (creating if needed) the database at `path` with a bounded lock wait.
pub fn open_at(path: &Path, busy_timeout_ms: u64) -> Result<Connection> {
    let mut conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

/// Start a write transaction that takes the database write lock up front, so
/// read-check-write sequences inside it cannot interleave with other writers.
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        telegram_id INTEGER NOT NULL UNIQUE CHECK(telegram_id > 0),
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        referral_code TEXT NOT NULL UNIQUE,
        referred_by INTEGER,
        balance TEXT NOT NULL DEFAULT '0',
        total_profit TEXT NOT NULL DEFAULT '0',
        referral_bonus_total TEXT NOT NULL DEFAULT '0',
        is_active INTEGER NOT NULL DEFAULT 1,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(referred_by) REFERENCES accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_created ON accounts(created_at);

    CREATE TABLE IF NOT EXISTS packages(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        price TEXT NOT NULL,
        duration_days INTEGER NOT NULL CHECK(duration_days >= 1),
        daily_return_rate TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- terms are copied from the package at purchase time
    CREATE TABLE IF NOT EXISTS subscriptions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        package_id INTEGER NOT NULL,
        principal TEXT NOT NULL,
        daily_return_rate TEXT NOT NULL,
        duration_days INTEGER NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        last_claim_date TEXT,
        status TEXT NOT NULL CHECK(status IN ('active','completed','cancelled')),
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id),
        FOREIGN KEY(package_id) REFERENCES packages(id)
    );
    CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(status, end_date);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_account ON subscriptions(account_id);

    CREATE TABLE IF NOT EXISTS referrals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        referrer_id INTEGER NOT NULL,
        referred_id INTEGER NOT NULL UNIQUE,
        bonus_amount TEXT NOT NULL,
        is_paid INTEGER NOT NULL DEFAULT 0,
        paid_at TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(referrer_id, referred_id),
        CHECK(referrer_id <> referred_id),
        FOREIGN KEY(referrer_id) REFERENCES accounts(id),
        FOREIGN KEY(referred_id) REFERENCES accounts(id)
    );

    -- append-only journal; amount is unsigned, type gives the direction
    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        subscription_id INTEGER,
        referral_id INTEGER,
        type TEXT NOT NULL CHECK(type IN ('purchase','claim','deposit','withdraw','referral_bonus')),
        amount TEXT NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('pending','completed','failed','cancelled')),
        claim_date TEXT,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id),
        FOREIGN KEY(subscription_id) REFERENCES subscriptions(id),
        FOREIGN KEY(referral_id) REFERENCES referrals(id)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id, created_at);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_claim_once
        ON transactions(subscription_id, claim_date) WHERE type = 'claim';
    CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_bonus_once
        ON transactions(referral_id) WHERE type = 'referral_bonus';

    CREATE TABLE IF NOT EXISTS rate_limits(
        key TEXT PRIMARY KEY,
        window_start INTEGER NOT NULL,
        count INTEGER NOT NULL,
        last_seen INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_rate_limits_last_seen ON rate_limits(last_seen);
    "#,
    )?;
    Ok(())
}
