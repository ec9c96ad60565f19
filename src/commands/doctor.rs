// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::audit;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, bail};
use rusqlite::Connection;

/// Print every discrepancy between stored totals and the journal. Fails when
/// any are found so scripts can alert on it.
pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let issues = audit::reconcile(conn)?;
    if !maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &issues)? {
        if issues.is_empty() {
            println!("doctor: no issues found");
        } else {
            let rows = issues
                .iter()
                .map(|d| {
                    vec![
                        d.check.to_string(),
                        d.account_id.map(|v| v.to_string()).unwrap_or_default(),
                        d.referral_id.map(|v| v.to_string()).unwrap_or_default(),
                        d.expected.clone(),
                        d.actual.clone(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["Issue", "Account", "Referral", "Expected", "Actual"], rows)
            );
        }
    }
    if !issues.is_empty() {
        bail!("doctor found {} issue(s)", issues.len());
    }
    Ok(())
}
