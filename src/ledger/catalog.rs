// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Package offerings. Editing an offering never touches subscriptions; their
//! terms were copied at purchase time.

use crate::config::LedgerSettings;
use crate::error::{LedgerError, Result};
use crate::models::{PackageOffering, accrual};
use crate::utils::decimal_at;
use log::info;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

pub(crate) const PACKAGE_COLUMNS: &str =
    "id, name, description, price, duration_days, daily_return_rate, is_active, created_at";

#[derive(Debug, Clone)]
pub struct PackageDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_days: u32,
    pub daily_return_rate: Decimal,
}

pub(crate) fn map_row(r: &Row<'_>) -> rusqlite::Result<PackageOffering> {
    Ok(PackageOffering {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        price: decimal_at(r, 3)?,
        duration_days: r.get(4)?,
        daily_return_rate: decimal_at(r, 5)?,
        active: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn validate(settings: &LedgerSettings, draft: &PackageDraft) -> Result<()> {
    let name_len = draft.name.trim().chars().count();
    if !(3..=100).contains(&name_len) {
        return Err(LedgerError::validation(
            "package name must be 3 to 100 characters",
        ));
    }
    if draft.price <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "price must be positive, got {}",
            draft.price
        )));
    }
    if draft.duration_days < settings.min_duration_days
        || draft.duration_days > settings.max_duration_days
    {
        return Err(LedgerError::validation(format!(
            "duration must be between {} and {} days, got {}",
            settings.min_duration_days, settings.max_duration_days, draft.duration_days
        )));
    }
    if draft.daily_return_rate <= Decimal::ZERO || draft.daily_return_rate > settings.max_daily_rate
    {
        return Err(LedgerError::validation(format!(
            "daily return rate must be in (0, {}], got {}",
            settings.max_daily_rate, draft.daily_return_rate
        )));
    }
    // a subscription whose daily return truncates to zero could never be claimed
    if accrual(draft.price, draft.daily_return_rate).is_zero() {
        return Err(LedgerError::validation(format!(
            "daily return on {} at {} is below 0.01",
            draft.price, draft.daily_return_rate
        )));
    }
    Ok(())
}

pub fn create(
    conn: &Connection,
    settings: &LedgerSettings,
    draft: &PackageDraft,
) -> Result<PackageOffering> {
    validate(settings, draft)?;
    conn.execute(
        "INSERT INTO packages(name, description, price, duration_days, daily_return_rate)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            draft.name.trim(),
            draft.description,
            draft.price.to_string(),
            draft.duration_days,
            draft.daily_return_rate.to_string()
        ],
    )?;
    let pkg = get(conn, conn.last_insert_rowid())?;
    info!(
        "package {} '{}' created price={} days={} rate={}",
        pkg.id, pkg.name, pkg.price, pkg.duration_days, pkg.daily_return_rate
    );
    Ok(pkg)
}

pub fn update(
    conn: &Connection,
    settings: &LedgerSettings,
    id: i64,
    draft: &PackageDraft,
) -> Result<PackageOffering> {
    validate(settings, draft)?;
    let changed = conn.execute(
        "UPDATE packages SET name=?1, description=?2, price=?3, duration_days=?4, daily_return_rate=?5
         WHERE id=?6",
        params![
            draft.name.trim(),
            draft.description,
            draft.price.to_string(),
            draft.duration_days,
            draft.daily_return_rate.to_string(),
            id
        ],
    )?;
    if changed == 0 {
        return Err(LedgerError::PackageNotFound(id));
    }
    info!("package {} updated", id);
    get(conn, id)
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<PackageOffering> {
    let changed = conn.execute(
        "UPDATE packages SET is_active=?1 WHERE id=?2",
        params![active, id],
    )?;
    if changed == 0 {
        return Err(LedgerError::PackageNotFound(id));
    }
    info!("package {} active={}", id, active);
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> Result<PackageOffering> {
    let sql = format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id=?1");
    conn.query_row(&sql, params![id], map_row)
        .optional()?
        .ok_or(LedgerError::PackageNotFound(id))
}

/// Offerings ordered by price, cheapest first.
pub fn list(conn: &Connection, active_only: bool) -> Result<Vec<PackageOffering>> {
    let sql = if active_only {
        format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE is_active=1")
    } else {
        format!("SELECT {PACKAGE_COLUMNS} FROM packages")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    out.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
    Ok(out)
}
