// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error type shared by every ledger operation.

use chrono::NaiveDate;
use rusqlite::ErrorCode;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Package {0} not found")]
    PackageNotFound(i64),

    #[error("Subscription {0} not found")]
    SubscriptionNotFound(i64),

    #[error("Referral {0} not found")]
    ReferralNotFound(i64),

    #[error("Transaction {0} not found")]
    TransactionNotFound(i64),

    #[error("Package {0} is not active")]
    PackageInactive(i64),

    #[error("Account {0} is not active")]
    AccountInactive(i64),

    #[error("Subscription {0} is not active")]
    SubscriptionNotActive(i64),

    #[error("Subscription {id} cannot be claimed before {first_claim}")]
    NotYetClaimable { id: i64, first_claim: NaiveDate },

    #[error("Subscription {id} was last claimed on {last_claim}; {as_of} is earlier")]
    ClaimDateRegressed {
        id: i64,
        last_claim: NaiveDate,
        as_of: NaiveDate,
    },

    #[error("Subscription {id} already claimed for {date}")]
    AlreadyClaimedToday { id: i64, date: NaiveDate },

    #[error("Insufficient funds: balance {balance}, required {required}, short by {shortfall}")]
    InsufficientFunds {
        balance: Decimal,
        required: Decimal,
        shortfall: Decimal,
    },

    #[error("Invalid referral code '{0}'")]
    InvalidReferralCode(String),

    #[error("Telegram user {0} is already registered")]
    DuplicateAccount(i64),

    #[error("Account {0} cannot refer itself")]
    SelfReferral(i64),

    #[error("Account {referred} already has a referral record (referrer {referrer})")]
    DuplicateReferral { referrer: i64, referred: i64 },

    #[error("Referral {0} bonus already paid")]
    AlreadyPaid(i64),

    #[error("Transaction {id} is {status}, expected pending")]
    TransactionNotPending { id: i64, status: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Coarse classification the API and bot layers translate into responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientFunds,
    Duplicate,
    Validation,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidState => 409,
            ErrorKind::InsufficientFunds => 422,
            ErrorKind::Duplicate => 409,
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 503,
            ErrorKind::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            AccountNotFound(_)
            | PackageNotFound(_)
            | SubscriptionNotFound(_)
            | ReferralNotFound(_)
            | TransactionNotFound(_) => ErrorKind::NotFound,
            PackageInactive(_)
            | AccountInactive(_)
            | SubscriptionNotActive(_)
            | NotYetClaimable { .. }
            | ClaimDateRegressed { .. }
            | TransactionNotPending { .. } => ErrorKind::InvalidState,
            InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AlreadyClaimedToday { .. }
            | DuplicateReferral { .. }
            | DuplicateAccount(_)
            | AlreadyPaid(_) => ErrorKind::Duplicate,
            InvalidReferralCode(_) | SelfReferral(_) | Validation(_) => ErrorKind::Validation,
            Conflict(_) => ErrorKind::Conflict,
            Database(_) => ErrorKind::Internal,
        }
    }

    /// Conflicts are the only failures where replaying the whole operation can succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn insufficient(balance: Decimal, required: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            balance,
            required,
            shortfall: required - balance,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                LedgerError::Conflict(err.to_string())
            }
            _ => LedgerError::Database(err),
        }
    }
}
