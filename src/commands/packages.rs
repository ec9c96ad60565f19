// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use crate::ledger::catalog::{self, PackageDraft};
use crate::models::PackageOffering;
use crate::queries::{self, PackageFilter, Paginated, SortOrder};
use crate::utils::{fmt_money, fmt_rate, maybe_print_json, parse_decimal, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, settings: &Settings, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let pkg = catalog::create(conn, &settings.ledger, &draft(sub)?)?;
            println!(
                "Added package {} '{}' ({} for {} days at {} daily)",
                pkg.id,
                pkg.name,
                fmt_money(&pkg.price),
                pkg.duration_days,
                fmt_rate(&pkg.daily_return_rate)
            );
        }
        Some(("update", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let pkg = catalog::update(conn, &settings.ledger, id, &draft(sub)?)?;
            println!("Updated package {} '{}'", pkg.id, pkg.name);
        }
        Some(("set-active", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let state = *sub.get_one::<bool>("state").unwrap();
            catalog::set_active(conn, id, state)?;
            println!(
                "Package {} {}",
                id,
                if state { "activated" } else { "deactivated" }
            );
        }
        Some(("list", sub)) => {
            let data = query_packages(conn, sub)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .items
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            fmt_money(&p.price),
                            p.duration_days.to_string(),
                            fmt_rate(&p.daily_return_rate),
                            if p.active { "yes" } else { "no" }.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Price", "Days", "Daily", "Active"], rows)
                );
                super::print_pagination(&data.pagination);
            }
        }
        _ => {}
    }
    Ok(())
}

fn draft(sub: &clap::ArgMatches) -> Result<PackageDraft> {
    Ok(PackageDraft {
        name: sub.get_one::<String>("name").unwrap().trim().to_string(),
        description: sub
            .get_one::<String>("description")
            .map(|s| s.trim().to_string()),
        price: parse_decimal(sub.get_one::<String>("price").unwrap())?,
        duration_days: *sub.get_one::<u32>("days").unwrap(),
        daily_return_rate: parse_decimal(sub.get_one::<String>("rate").unwrap())?,
    })
}

/// Active packages unless `--all` or `--inactive`; cheapest first unless a sort is chosen.
pub fn query_packages(
    conn: &Connection,
    sub: &clap::ArgMatches,
) -> Result<Paginated<PackageOffering>> {
    let (page, mut sort) = super::listing(sub)?;
    if sort.field.is_none() {
        sort.order = SortOrder::Asc;
    }
    let active = if sub.get_flag("all") {
        None
    } else {
        Some(!sub.get_flag("inactive"))
    };
    let filter = PackageFilter {
        search: sub.get_one::<String>("search").cloned(),
        active,
        min_price: sub.get_one::<String>("min-price").map(|s| parse_decimal(s)).transpose()?,
        max_price: sub.get_one::<String>("max-price").map(|s| parse_decimal(s)).transpose()?,
        min_duration: sub.get_one::<u32>("min-days").copied(),
        max_duration: sub.get_one::<u32>("max-days").copied(),
    };
    Ok(queries::list_packages(conn, &filter, &sort, page)?)
}
