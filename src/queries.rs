// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-side listings with filters, allow-listed sorting and pagination.

use crate::error::{LedgerError, Result};
use crate::ledger::{accounts, catalog, journal, subscriptions};
use crate::models::{
    Account, LedgerTransaction, PackageOffering, Subscription, SubscriptionStatus, TxKind, TxStatus,
};
use crate::utils::decimal_at;
use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{Connection, Row, ToSql, params, params_from_iter};
use rust_decimal::Decimal;
use serde::Serialize;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 {
            return Err(LedgerError::validation("page must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(LedgerError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    fn new(page: Page, total_items: u64) -> Self {
        let per = u64::from(page.limit);
        let total_pages = total_items.div_ceil(per) as u32;
        Self {
            current_page: page.page,
            total_pages,
            total_items,
            items_per_page: page.limit,
            has_next_page: page.page < total_pages,
            has_prev_page: page.page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// A requested ordering; the field is resolved against a per-entity allow-list.
#[derive(Debug, Clone, Default)]
pub struct Sort {
    pub field: Option<String>,
    pub order: SortOrder,
}

impl Sort {
    pub fn by(field: &str, order: SortOrder) -> Self {
        Self {
            field: Some(field.to_string()),
            order,
        }
    }

    fn resolve(&self, allowed: &[(&str, &str)], default: &str) -> Result<String> {
        let column = match self.field.as_deref() {
            None => default,
            Some(name) => allowed
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, col)| *col)
                .ok_or_else(|| {
                    let names: Vec<&str> = allowed.iter().map(|(k, _)| *k).collect();
                    LedgerError::validation(format!(
                        "cannot sort by '{}'; expected one of {}",
                        name,
                        names.join(", ")
                    ))
                })?,
        };
        let dir = match self.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        Ok(format!("{column} {dir}, id {dir}"))
    }
}

const ACCOUNT_SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("created_at", "created_at"),
    ("telegram_id", "telegram_id"),
    ("first_name", "first_name"),
    ("balance", "CAST(balance AS REAL)"),
    ("total_profit", "CAST(total_profit AS REAL)"),
];

const PACKAGE_SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("price", "CAST(price AS REAL)"),
    ("duration", "duration_days"),
    ("rate", "CAST(daily_return_rate AS REAL)"),
];

const SUBSCRIPTION_SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("start_date", "start_date"),
    ("end_date", "end_date"),
    ("principal", "CAST(principal AS REAL)"),
];

const TRANSACTION_SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("created_at", "created_at"),
    ("amount", "CAST(amount AS REAL)"),
    ("type", "type"),
];

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Substring of first name, last name, username or telegram id.
    pub search: Option<String>,
    pub active: Option<bool>,
    pub min_balance: Option<Decimal>,
    pub max_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    /// Substring of name or description.
    pub search: Option<String>,
    pub active: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_duration: Option<u32>,
    pub max_duration: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub account_id: Option<i64>,
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub account_id: Option<i64>,
    pub kind: Option<TxKind>,
    pub status: Option<TxStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub new_today: i64,
    pub total_balance: Decimal,
}

/// Journal summary. Amount totals count completed entries only; `today`,
/// `this_week` (from Monday) and `this_month` count entries of any status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionStats {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub deposits: Decimal,
    pub purchases: Decimal,
    pub claims: Decimal,
    pub referral_bonuses: Decimal,
    pub withdrawals: Decimal,
    pub today: i64,
    pub this_week: i64,
    pub this_month: i64,
}

#[allow(clippy::too_many_arguments)]
fn paged<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    where_sql: &str,
    args: Vec<Box<dyn ToSql>>,
    order_sql: &str,
    page: Page,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Paginated<T>> {
    let count_sql = format!("SELECT COUNT(*) FROM {table} WHERE 1=1{where_sql}");
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(args.iter()),
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {columns} FROM {table} WHERE 1=1{where_sql} ORDER BY {order_sql} LIMIT {} OFFSET {}",
        page.limit,
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), map)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(Paginated {
        items,
        pagination: Pagination::new(page, total.max(0) as u64),
    })
}

pub fn list_accounts(
    conn: &Connection,
    filter: &AccountFilter,
    sort: &Sort,
    page: Page,
) -> Result<Paginated<Account>> {
    let mut sql = String::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        sql.push_str(
            " AND (first_name LIKE ? OR last_name LIKE ? OR username LIKE ? OR CAST(telegram_id AS TEXT) LIKE ?)",
        );
        let like = format!("%{term}%");
        for _ in 0..4 {
            args.push(Box::new(like.clone()));
        }
    }
    if let Some(active) = filter.active {
        sql.push_str(" AND is_active=?");
        args.push(Box::new(active));
    }
    if let Some(min) = filter.min_balance {
        sql.push_str(" AND CAST(balance AS REAL) >= CAST(? AS REAL)");
        args.push(Box::new(min.to_string()));
    }
    if let Some(max) = filter.max_balance {
        sql.push_str(" AND CAST(balance AS REAL) <= CAST(? AS REAL)");
        args.push(Box::new(max.to_string()));
    }
    let order = sort.resolve(ACCOUNT_SORTS, "created_at")?;
    paged(
        conn,
        "accounts",
        accounts::ACCOUNT_COLUMNS,
        &sql,
        args,
        &order,
        page,
        accounts::map_row,
    )
}

pub fn list_packages(
    conn: &Connection,
    filter: &PackageFilter,
    sort: &Sort,
    page: Page,
) -> Result<Paginated<PackageOffering>> {
    let mut sql = String::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        sql.push_str(" AND (name LIKE ? OR description LIKE ?)");
        let like = format!("%{term}%");
        args.push(Box::new(like.clone()));
        args.push(Box::new(like));
    }
    if let Some(active) = filter.active {
        sql.push_str(" AND is_active=?");
        args.push(Box::new(active));
    }
    if let Some(min) = filter.min_price {
        sql.push_str(" AND CAST(price AS REAL) >= CAST(? AS REAL)");
        args.push(Box::new(min.to_string()));
    }
    if let Some(max) = filter.max_price {
        sql.push_str(" AND CAST(price AS REAL) <= CAST(? AS REAL)");
        args.push(Box::new(max.to_string()));
    }
    if let Some(min) = filter.min_duration {
        sql.push_str(" AND duration_days >= ?");
        args.push(Box::new(min));
    }
    if let Some(max) = filter.max_duration {
        sql.push_str(" AND duration_days <= ?");
        args.push(Box::new(max));
    }
    let order = sort.resolve(PACKAGE_SORTS, "CAST(price AS REAL)")?;
    paged(
        conn,
        "packages",
        catalog::PACKAGE_COLUMNS,
        &sql,
        args,
        &order,
        page,
        catalog::map_row,
    )
}

pub fn list_subscriptions(
    conn: &Connection,
    filter: &SubscriptionFilter,
    sort: &Sort,
    page: Page,
) -> Result<Paginated<Subscription>> {
    let mut sql = String::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(id) = filter.account_id {
        sql.push_str(" AND account_id=?");
        args.push(Box::new(id));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status=?");
        args.push(Box::new(status));
    }
    let order = sort.resolve(SUBSCRIPTION_SORTS, "start_date")?;
    paged(
        conn,
        "subscriptions",
        subscriptions::SUBSCRIPTION_COLUMNS,
        &sql,
        args,
        &order,
        page,
        subscriptions::map_row,
    )
}

pub fn list_transactions(
    conn: &Connection,
    filter: &TransactionFilter,
    sort: &Sort,
    page: Page,
) -> Result<Paginated<LedgerTransaction>> {
    let mut sql = String::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(id) = filter.account_id {
        sql.push_str(" AND account_id=?");
        args.push(Box::new(id));
    }
    if let Some(kind) = filter.kind {
        sql.push_str(" AND type=?");
        args.push(Box::new(kind));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status=?");
        args.push(Box::new(status));
    }
    if let Some(from) = filter.from {
        sql.push_str(" AND date(created_at) >= ?");
        args.push(Box::new(from));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND date(created_at) <= ?");
        args.push(Box::new(to));
    }
    let order = sort.resolve(TRANSACTION_SORTS, "created_at")?;
    paged(
        conn,
        "transactions",
        journal::TX_COLUMNS,
        &sql,
        args,
        &order,
        page,
        journal::map_row,
    )
}

/// Headline counts; `total_balance` sums active accounts only.
pub fn account_stats(conn: &Connection, today: NaiveDate) -> Result<AccountStats> {
    let (total, active, new_today): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_active),0),
                COALESCE(SUM(CASE WHEN date(created_at)=?1 THEN 1 ELSE 0 END),0)
         FROM accounts",
        params![today],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    let mut stmt = conn.prepare("SELECT balance FROM accounts WHERE is_active=1")?;
    let rows = stmt.query_map([], |r| decimal_at(r, 0))?;
    let mut total_balance = Decimal::ZERO;
    for row in rows {
        total_balance += row?;
    }
    Ok(AccountStats {
        total,
        active,
        inactive: total - active,
        new_today,
        total_balance,
    })
}

pub fn transaction_stats(conn: &Connection, today: NaiveDate) -> Result<TransactionStats> {
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = today - Duration::days(i64::from(today.day0()));
    let mut stats = TransactionStats::default();
    let mut stmt = conn.prepare("SELECT type, status, amount, date(created_at) FROM transactions")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let kind: TxKind = r.get(0)?;
        let status: TxStatus = r.get(1)?;
        let amount = decimal_at(r, 2)?;
        let day: NaiveDate = r.get(3)?;

        stats.total += 1;
        match status {
            TxStatus::Pending => stats.pending += 1,
            TxStatus::Completed => stats.completed += 1,
            TxStatus::Failed => stats.failed += 1,
            TxStatus::Cancelled => stats.cancelled += 1,
        }
        if status == TxStatus::Completed {
            let bucket = match kind {
                TxKind::Deposit => &mut stats.deposits,
                TxKind::Purchase => &mut stats.purchases,
                TxKind::Claim => &mut stats.claims,
                TxKind::ReferralBonus => &mut stats.referral_bonuses,
                TxKind::Withdraw => &mut stats.withdrawals,
            };
            *bucket += amount;
        }
        if day == today {
            stats.today += 1;
        }
        if day >= week_start && day <= today {
            stats.this_week += 1;
        }
        if day >= month_start && day <= today {
            stats.this_month += 1;
        }
    }
    Ok(stats)
}
