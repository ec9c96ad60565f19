// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<i64>,
    pub balance: Decimal,
    pub total_profit: Decimal,
    pub referral_bonus_total: Decimal,
    pub active: bool,
    #[serde(skip)]
    pub version: i64,
    pub created_at: NaiveDateTime,
}

impl Account {
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| format!("user-{}", self.telegram_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOffering {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_days: u32,
    pub daily_return_rate: Decimal, // fraction, 0.02 == 2%
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub account_id: i64,
    pub package_id: i64,
    pub principal: Decimal,
    pub daily_return_rate: Decimal,
    pub duration_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub last_claim_date: Option<NaiveDate>,
    pub status: SubscriptionStatus,
    #[serde(skip)]
    pub version: i64,
}

impl Subscription {
    pub fn daily_accrual(&self) -> Decimal {
        accrual(self.principal, self.daily_return_rate)
    }
}

/// Per-day accrual, truncated to cents so rounding never credits more than the contract.
pub fn accrual(principal: Decimal, rate: Decimal) -> Decimal {
    (principal * rate).round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToZero)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub account_id: i64,
    pub subscription_id: Option<i64>,
    pub referral_id: Option<i64>,
    pub kind: TxKind,
    pub amount: Decimal,
    pub status: TxStatus,
    pub claim_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
    pub bonus_amount: Decimal,
    pub paid: bool,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Error)]
#[error("unknown {what} '{value}'")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        what: $what,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Purchase,
    Claim,
    Deposit,
    Withdraw,
    ReferralBonus,
}

text_enum!(TxKind, "transaction type", {
    Purchase => "purchase",
    Claim => "claim",
    Deposit => "deposit",
    Withdraw => "withdraw",
    ReferralBonus => "referral_bonus",
});

impl TxKind {
    pub fn is_credit(self) -> bool {
        matches!(self, TxKind::Claim | TxKind::Deposit | TxKind::ReferralBonus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(TxStatus, "transaction status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Completed,
    Cancelled,
}

text_enum!(SubscriptionStatus, "subscription status", {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});
