// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use investledger::config::LedgerSettings;
use investledger::ledger::accounts::{self, NewAccount};
use investledger::{cli, commands::exporter, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::json;
use tempfile::tempdir;

fn base_conn() -> Connection {
    let mut conn = db::open_in_memory().unwrap();
    let id = accounts::register(
        &mut conn,
        &LedgerSettings::default(),
        &NewAccount {
            telegram_id: 5,
            ..Default::default()
        },
        None,
    )
    .unwrap()
    .account
    .id;
    accounts::deposit(&mut conn, id, Decimal::new(1234, 2), Some("Weekly top-up")).unwrap();
    conn
}

fn run_export(conn: &Connection, format: &str, out: &str) -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches_from([
        "investledger",
        "export",
        "transactions",
        "--format",
        format,
        "--out",
        out,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(conn, export_m)
    } else {
        panic!("no export subcommand");
    }
}

#[test]
fn export_transactions_streams_pretty_json() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.json");
    let out_str = out_path.to_string_lossy().to_string();

    run_export(&conn, "json", &out_str).unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let mut parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    parsed[0].as_object_mut().unwrap().remove("created_at");
    assert_eq!(
        parsed,
        json!([
            {
                "id": 1,
                "account_id": 1,
                "type": "deposit",
                "amount": "12.34",
                "status": "completed",
                "subscription_id": null,
                "referral_id": null,
                "claim_date": null,
                "description": "Weekly top-up"
            }
        ])
    );
}

#[test]
fn export_transactions_writes_csv() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.csv");
    run_export(&conn, "CSV", &out_path.to_string_lossy()).unwrap();

    let mut rdr = csv::Reader::from_path(&out_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(&headers[3], "type");
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][3], "deposit");
    assert_eq!(&rows[0][4], "12.34");
    assert_eq!(&rows[0][9], "Weekly top-up");
}

#[test]
fn export_transactions_rejects_unknown_format() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.unknown");
    let out_str = out_path.to_string_lossy().to_string();

    assert!(run_export(&conn, "xml", &out_str).is_err());
    assert!(!out_path.exists());
}
