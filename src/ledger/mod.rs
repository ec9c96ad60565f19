// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Core ledger. Each public write opens its own IMMEDIATE transaction and
//! either commits every row it touches or none of them.

pub mod accounts;
pub mod audit;
pub mod catalog;
pub mod claims;
pub mod journal;
pub mod referrals;
pub mod subscriptions;
