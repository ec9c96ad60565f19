// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::journal;
use anyhow::{Result, bail};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().trim().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    if fmt != "csv" && fmt != "json" {
        bail!("Unknown format: {} (use csv|json)", fmt);
    }

    let entries = journal::list_all(conn)?;
    if fmt == "csv" {
        let mut wtr = csv::Writer::from_path(out)?;
        wtr.write_record([
            "id",
            "created_at",
            "account_id",
            "type",
            "amount",
            "status",
            "subscription_id",
            "referral_id",
            "claim_date",
            "description",
        ])?;
        for t in &entries {
            wtr.write_record([
                t.id.to_string(),
                t.created_at.to_string(),
                t.account_id.to_string(),
                t.kind.to_string(),
                t.amount.to_string(),
                t.status.to_string(),
                t.subscription_id.map(|v| v.to_string()).unwrap_or_default(),
                t.referral_id.map(|v| v.to_string()).unwrap_or_default(),
                t.claim_date.map(|d| d.to_string()).unwrap_or_default(),
                t.description.clone().unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;
    } else {
        let items: Vec<_> = entries
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "created_at": t.created_at.to_string(),
                    "account_id": t.account_id,
                    "type": t.kind.as_str(),
                    "amount": t.amount.to_string(),
                    "status": t.status.as_str(),
                    "subscription_id": t.subscription_id,
                    "referral_id": t.referral_id,
                    "claim_date": t.claim_date.map(|d| d.to_string()),
                    "description": t.description,
                })
            })
            .collect();
        std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
    }
    println!("Exported {} transactions to {}", entries.len(), out);
    Ok(())
}
