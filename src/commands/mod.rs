// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod packages;
pub mod subscriptions;
pub mod claims;
pub mod referrals;
pub mod transactions;
pub mod exporter;
pub mod doctor;

use crate::queries::{Page, Sort, SortOrder};
use anyhow::Result;

/// `--page`, `--limit`, `--sort` and `--asc` from a listing subcommand.
pub(crate) fn listing(sub: &clap::ArgMatches) -> Result<(Page, Sort)> {
    let page = Page::new(
        *sub.get_one::<u32>("page").unwrap_or(&1),
        *sub.get_one::<u32>("limit").unwrap_or(&crate::queries::DEFAULT_LIMIT),
    )?;
    let order = if sub.get_flag("asc") {
        SortOrder::Asc
    } else {
        SortOrder::Desc
    };
    let sort = Sort {
        field: sub.get_one::<String>("sort").map(|s| s.trim().to_string()),
        order,
    };
    Ok((page, sort))
}

pub(crate) fn print_pagination(p: &crate::queries::Pagination) {
    println!(
        "page {}/{} ({} items)",
        p.current_page,
        p.total_pages.max(1),
        p.total_items
    );
}
