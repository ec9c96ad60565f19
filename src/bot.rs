// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Chat front-end glue. [`route`] maps a menu callback token to the ledger
//! operation it triggers and the screen to show; [`execute`] runs that
//! operation for one account behind the rate limiter.

use crate::api::user_message;
use crate::error::{LedgerError, Result};
use crate::ledger::referrals::{self, ReferralSummary};
use crate::ledger::subscriptions::{self, Quote};
use crate::ledger::{accounts, catalog, claims};
use crate::models::{Account, PackageOffering, ReferralRecord, Subscription, SubscriptionStatus};
use crate::ratelimit::{Decision, RateLimiter};
use crate::utils::{fmt_money, fmt_rate};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    MainMenu,
    Packages,
    BuyPackage(i64),
    ConfirmBuy(i64),
    DailyClaim,
    Claim(i64),
    Referral,
    ViewReferrals,
    ShareReferral,
    Topup,
    Balance,
}

impl FromStr for Callback {
    type Err = LedgerError;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let id_after = |prefix: &str| -> Option<Result<i64>> {
            token.strip_prefix(prefix).map(|rest| {
                rest.parse::<i64>()
                    .map_err(|_| LedgerError::validation(format!("bad id in callback '{token}'")))
            })
        };
        if let Some(id) = id_after("buy_package_") {
            return Ok(Callback::BuyPackage(id?));
        }
        if let Some(id) = id_after("confirm_buy_") {
            return Ok(Callback::ConfirmBuy(id?));
        }
        if let Some(id) = id_after("claim_") {
            return Ok(Callback::Claim(id?));
        }
        match token {
            "main_menu" => Ok(Callback::MainMenu),
            "packages" => Ok(Callback::Packages),
            "daily_claim" => Ok(Callback::DailyClaim),
            "referral" => Ok(Callback::Referral),
            "view_referrals" => Ok(Callback::ViewReferrals),
            "share_referral" => Ok(Callback::ShareReferral),
            "topup" => Ok(Callback::Topup),
            "balance" => Ok(Callback::Balance),
            other => Err(LedgerError::validation(format!(
                "unknown callback '{other}'"
            ))),
        }
    }
}

/// Ledger operation requested by a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreOp {
    ListPackages,
    QuotePurchase { package_id: i64 },
    Purchase { package_id: i64 },
    ListClaimable,
    Claim { subscription_id: i64 },
    ReferralSummary,
    ListReferrals,
    ShareReferral,
    ShowBalance,
}

impl CoreOp {
    /// Operations that move money.
    pub fn is_write(&self) -> bool {
        matches!(self, CoreOp::Purchase { .. } | CoreOp::Claim { .. })
    }
}

/// Screen to present once the operation (if any) has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    MainMenu,
    PackageList,
    PurchaseConfirmation,
    PurchaseReceipt,
    ClaimList,
    ClaimReceipt,
    ReferralInfo,
    ReferralList,
    ShareLink,
    TopupInstructions,
    Balance,
    Unknown,
}

pub fn route(token: &str) -> (Option<CoreOp>, Render) {
    let Ok(cb) = token.parse::<Callback>() else {
        return (None, Render::Unknown);
    };
    match cb {
        Callback::MainMenu => (None, Render::MainMenu),
        Callback::Packages => (Some(CoreOp::ListPackages), Render::PackageList),
        Callback::BuyPackage(package_id) => (
            Some(CoreOp::QuotePurchase { package_id }),
            Render::PurchaseConfirmation,
        ),
        Callback::ConfirmBuy(package_id) => {
            (Some(CoreOp::Purchase { package_id }), Render::PurchaseReceipt)
        }
        Callback::DailyClaim => (Some(CoreOp::ListClaimable), Render::ClaimList),
        Callback::Claim(subscription_id) => (
            Some(CoreOp::Claim { subscription_id }),
            Render::ClaimReceipt,
        ),
        Callback::Referral => (Some(CoreOp::ReferralSummary), Render::ReferralInfo),
        Callback::ViewReferrals => (Some(CoreOp::ListReferrals), Render::ReferralList),
        Callback::ShareReferral => (Some(CoreOp::ShareReferral), Render::ShareLink),
        Callback::Topup => (None, Render::TopupInstructions),
        Callback::Balance => (Some(CoreOp::ShowBalance), Render::Balance),
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Packages(Vec<PackageOffering>),
    Quote(Quote),
    Purchased {
        subscription: Subscription,
        balance: Decimal,
    },
    Claimable(Vec<Subscription>),
    Claimed {
        amount: Decimal,
        balance: Decimal,
        completed: bool,
    },
    Referrals(ReferralSummary),
    ReferralList(Vec<ReferralRecord>),
    Share {
        code: String,
    },
    Balance(Account),
    RateLimited {
        retry_after: i64,
    },
}

fn ensure_owner(sub: &Subscription, account_id: i64) -> Result<()> {
    if sub.account_id != account_id {
        return Err(LedgerError::SubscriptionNotFound(sub.id));
    }
    Ok(())
}

/// Run `op` for `account_id`. `today` is the ledger date, `now` the unix time
/// used for throttling.
pub fn execute(
    conn: &mut Connection,
    limiter: &RateLimiter,
    account_id: i64,
    op: CoreOp,
    today: NaiveDate,
    now: i64,
) -> Result<Reply> {
    match limiter.check(conn, &format!("account:{account_id}"), now)? {
        Decision::Allowed { .. } => {}
        Decision::TooSoon { retry_after } | Decision::WindowExhausted { retry_after } => {
            return Ok(Reply::RateLimited { retry_after });
        }
    }

    let reply = match op {
        CoreOp::ListPackages => Reply::Packages(catalog::list(conn, true)?),
        CoreOp::QuotePurchase { package_id } => {
            Reply::Quote(subscriptions::quote(conn, account_id, package_id)?)
        }
        CoreOp::Purchase { package_id } => {
            let bought = subscriptions::purchase(conn, account_id, package_id, today)?;
            Reply::Purchased {
                subscription: bought.subscription,
                balance: bought.posting.balance,
            }
        }
        CoreOp::ListClaimable => {
            let due = subscriptions::list_for_account(conn, account_id)?
                .into_iter()
                .filter(|s| {
                    s.status == SubscriptionStatus::Active
                        && s.start_date < today
                        && today <= s.end_date
                        && s.last_claim_date.is_none_or(|d| d < today)
                })
                .collect();
            Reply::Claimable(due)
        }
        CoreOp::Claim { subscription_id } => {
            ensure_owner(&subscriptions::get(conn, subscription_id)?, account_id)?;
            let outcome = claims::claim(conn, subscription_id, today)?;
            Reply::Claimed {
                completed: outcome.completed(),
                amount: outcome.amount,
                balance: outcome.posting.balance,
            }
        }
        CoreOp::ReferralSummary => Reply::Referrals(referrals::summary(conn, account_id)?),
        CoreOp::ListReferrals => {
            Reply::ReferralList(referrals::list_for_referrer(conn, account_id)?)
        }
        CoreOp::ShareReferral => Reply::Share {
            code: accounts::get(conn, account_id)?.referral_code,
        },
        CoreOp::ShowBalance => Reply::Balance(accounts::get(conn, account_id)?),
    };
    Ok(reply)
}

/// Message text for a reply.
pub fn reply_text(reply: &Reply) -> String {
    let mut out = String::new();
    match reply {
        Reply::Packages(pkgs) if pkgs.is_empty() => out.push_str("No packages available."),
        Reply::Packages(pkgs) => {
            out.push_str("Investment packages:\n");
            for p in pkgs {
                let _ = writeln!(
                    out,
                    "- {}: {} for {} days at {} daily",
                    p.name,
                    fmt_money(&p.price),
                    p.duration_days,
                    fmt_rate(&p.daily_return_rate)
                );
            }
        }
        Reply::Quote(q) if q.shortfall > Decimal::ZERO => {
            let _ = write!(
                out,
                "Price {}. Your balance {} is short by {}.",
                fmt_money(&q.price),
                fmt_money(&q.balance),
                fmt_money(&q.shortfall)
            );
        }
        Reply::Quote(q) => {
            let _ = write!(
                out,
                "Price {}. Balance after purchase {}. Daily return {}, total {}. Confirm?",
                fmt_money(&q.price),
                fmt_money(&q.balance_after),
                fmt_money(&q.daily_accrual),
                fmt_money(&q.total_return)
            );
        }
        Reply::Purchased {
            subscription,
            balance,
        } => {
            let _ = write!(
                out,
                "Subscription #{} active until {}. Balance {}.",
                subscription.id,
                subscription.end_date,
                fmt_money(balance)
            );
        }
        Reply::Claimable(subs) if subs.is_empty() => {
            out.push_str("Nothing to claim right now.")
        }
        Reply::Claimable(subs) => {
            out.push_str("Ready to claim:\n");
            for s in subs {
                let _ = writeln!(out, "- #{}: {}", s.id, fmt_money(&s.daily_accrual()));
            }
        }
        Reply::Claimed {
            amount,
            balance,
            completed,
        } => {
            let _ = write!(
                out,
                "Claimed {}. Balance {}.",
                fmt_money(amount),
                fmt_money(balance)
            );
            if *completed {
                out.push_str(" Subscription completed.");
            }
        }
        Reply::Referrals(s) => {
            let _ = write!(
                out,
                "Code {}: {} referrals, {} paid, bonus {}.",
                s.referral_code,
                s.total_referrals,
                s.paid_referrals,
                fmt_money(&s.total_bonus)
            );
        }
        Reply::ReferralList(list) => {
            let _ = write!(out, "{} referred accounts.", list.len());
        }
        Reply::Share { code } => {
            let _ = write!(out, "Share your code {code} with friends.");
        }
        Reply::Balance(acct) => {
            let _ = write!(
                out,
                "Balance {}. Profit {}. Referral bonus {}.",
                fmt_money(&acct.balance),
                fmt_money(&acct.total_profit),
                fmt_money(&acct.referral_bonus_total)
            );
        }
        Reply::RateLimited { retry_after } => {
            let _ = write!(out, "Too many requests, try again in {retry_after}s.");
        }
    }
    out
}

/// Message text for a failed operation.
pub fn error_text(err: &LedgerError) -> String {
    match err {
        LedgerError::InsufficientFunds { shortfall, .. } => {
            format!("Insufficient balance, short by {}.", fmt_money(shortfall))
        }
        LedgerError::AlreadyClaimedToday { .. } => "Already claimed today.".to_string(),
        LedgerError::NotYetClaimable { first_claim, .. } => {
            format!("First claim available on {first_claim}.")
        }
        other => format!("{}.", user_message(other.kind())),
    }
}
