// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use recat::db;
use recat::engine::{self, EngineError};
use recat::ledger::{AccountTree, account_balance, transaction_splits};
use recat::rules::{RuleError, RuleSet};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

const PARKING_RULES: &str = r#"{
    "parking": { "regex": "^Parking", "priority": 1, "dest": "Expenses:Auto:Parking", "src": "Assets:Checking" }
}"#;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn add_account(conn: &Connection, path: &str) -> i64 {
    let mut parent: i64 = conn
        .query_row("SELECT id FROM accounts WHERE parent_id IS NULL", [], |r| {
            r.get(0)
        })
        .unwrap();
    for segment in path.split(':') {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE parent_id=?1 AND name=?2",
                params![parent, segment],
                |r| r.get(0),
            )
            .optional()
            .unwrap();
        parent = match existing {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO accounts(parent_id, name) VALUES (?1, ?2)",
                    params![parent, segment],
                )
                .unwrap();
                conn.last_insert_rowid()
            }
        };
    }
    parent
}

fn add_txn(conn: &Connection, date: &str, description: &str, legs: &[(&str, &str)]) -> i64 {
    conn.execute(
        "INSERT INTO transactions(date, description) VALUES (?1, ?2)",
        params![date, description],
    )
    .unwrap();
    let tx_id = conn.last_insert_rowid();
    for (path, amount) in legs {
        let account_id = add_account(conn, path);
        conn.execute(
            "INSERT INTO splits(tx_id, account_id, amount) VALUES (?1, ?2, ?3)",
            params![tx_id, account_id, amount],
        )
        .unwrap();
    }
    tx_id
}

fn balance(conn: &Connection, path: &str) -> Decimal {
    let tree = AccountTree::load(conn).unwrap();
    account_balance(conn, tree.resolve(path).unwrap()).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn reassigns_parking_fee_end_to_end() {
    let mut conn = setup();
    // one already-categorized parking charge, one awaiting categorization
    add_txn(
        &conn,
        "2000-04-02",
        "Parking garage",
        &[("Assets:Checking", "-20.00"), ("Expenses:Auto:Parking", "20.00")],
    );
    let tx_id = add_txn(
        &conn,
        "2000-05-10",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(
        &mut conn,
        &rules,
        date("2000-05-01"),
        Some(date("2000-05-31")),
    )
    .unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.reassigned, 1);
    assert!(report.saved);

    assert_eq!(balance(&conn, "Expenses:Auto:Parking"), Decimal::from(25));
    assert_eq!(balance(&conn, "Undefined"), Decimal::ZERO);

    // only the account moved; the two legs still sum to zero
    let legs = transaction_splits(&conn, tx_id).unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(
        legs.iter().map(|l| l.amount).sum::<Decimal>(),
        Decimal::ZERO
    );
}

#[test]
fn end_date_is_inclusive() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Auto:Parking");
    add_txn(
        &conn,
        "2000-05-31",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );
    add_txn(
        &conn,
        "2000-06-01",
        "Parking fee",
        &[("Assets:Checking", "-7.00"), ("Undefined", "7.00")],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(
        &mut conn,
        &rules,
        date("2000-05-01"),
        Some(date("2000-05-31")),
    )
    .unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.reassigned, 1);
    assert_eq!(balance(&conn, "Expenses:Auto:Parking"), Decimal::from(5));
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(7));
}

#[test]
fn no_end_date_scans_everything() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Auto:Parking");
    add_txn(
        &conn,
        "2000-05-31",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );
    add_txn(
        &conn,
        "2009-12-01",
        "Parking fee",
        &[("Assets:Checking", "-7.00"), ("Undefined", "7.00")],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();

    assert_eq!(report.reassigned, 2);
    assert_eq!(balance(&conn, "Expenses:Auto:Parking"), Decimal::from(12));
}

#[test]
fn credits_are_not_candidates() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Auto:Parking");
    // a refund: money flows INTO the source account
    add_txn(
        &conn,
        "2000-05-10",
        "Parking refund",
        &[("Assets:Checking", "5.00"), ("Undefined", "-5.00")],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();

    assert_eq!(report.scanned, 0);
    assert!(!report.saved);
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(-5));
}

#[test]
fn unmatched_candidates_are_left_untouched() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Auto:Parking");
    add_txn(
        &conn,
        "2000-05-10",
        "Grocery store",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.reassigned, 0);
    assert!(!report.saved);
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(5));
}

#[test]
fn multi_leg_transactions_abort_the_whole_run() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Auto:Parking");
    // this one is fine and would be reassigned first
    add_txn(
        &conn,
        "2000-05-02",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );
    // a three-leg split with an Undefined leg must not be auto-handled
    let split_tx = add_txn(
        &conn,
        "2000-05-10",
        "Parking and gas",
        &[
            ("Assets:Checking", "-10.00"),
            ("Undefined", "5.00"),
            ("Expenses:Auto:Gas", "5.00"),
        ],
    );

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let err = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap_err();
    match err {
        EngineError::UnsupportedSplitTransaction { tx_id, count } => {
            assert_eq!(tx_id, split_tx);
            assert_eq!(count, 3);
        }
        other => panic!("expected UnsupportedSplitTransaction, got {}", other),
    }

    // all-or-nothing: the earlier valid reassignment was rolled back too
    assert_eq!(balance(&conn, "Expenses:Auto:Parking"), Decimal::ZERO);
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(10));
    let legs = transaction_splits(&conn, split_tx).unwrap();
    assert_eq!(legs.len(), 3);
    assert_eq!(
        legs.iter().map(|l| l.amount).sum::<Decimal>(),
        Decimal::ZERO
    );
}

#[test]
fn rule_validation_fails_before_any_mutation() {
    let mut conn = setup();
    add_txn(
        &conn,
        "2000-05-10",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );

    // dest account does not exist in this ledger
    let rules = RuleSet::from_json(
        r#"{ "parking": { "regex": "^Parking", "priority": 1, "dest": "Expenses:Nope", "src": "Assets:Checking" } }"#,
    )
    .unwrap();
    let err = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rule(RuleError::AccountNotFound { ref rule, .. }) if rule == "parking"
    ));
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(5));
}

#[test]
fn higher_priority_rule_decides_the_destination() {
    let mut conn = setup();
    add_account(&conn, "Expenses:Misc");
    add_account(&conn, "Expenses:Auto:Parking");
    add_txn(
        &conn,
        "2000-05-10",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
    );

    let rules = RuleSet::from_json(
        r#"{
            "src": "Assets:Checking",
            "catchall": { "regex": "^Park", "priority": 1, "dest": "Expenses:Misc" },
            "parking": { "regex": "^Parking", "priority": 5, "dest": "Expenses:Auto:Parking" }
        }"#,
    )
    .unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();

    assert_eq!(report.reassigned, 1);
    assert_eq!(balance(&conn, "Expenses:Auto:Parking"), Decimal::from(5));
    assert_eq!(balance(&conn, "Expenses:Misc"), Decimal::ZERO);
}

#[test]
fn ledger_without_undefined_account_has_nothing_to_do() {
    let mut conn = setup();
    add_txn(
        &conn,
        "2000-05-10",
        "Parking fee",
        &[("Assets:Checking", "-5.00"), ("Expenses:Auto:Parking", "5.00")],
    );
    conn.execute("DELETE FROM accounts WHERE name = 'Undefined'", [])
        .unwrap();

    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();

    assert_eq!(report.scanned, 0);
    assert!(!report.saved);
}

#[test]
fn zero_reassignments_never_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.sqlite");
    {
        let conn = db::create_ledger(&path).unwrap();
        add_account(&conn, "Expenses:Auto:Parking");
        add_txn(
            &conn,
            "2000-05-10",
            "Grocery store",
            &[("Assets:Checking", "-5.00"), ("Undefined", "5.00")],
        );
    }

    let mut conn = db::open_ledger(&path).unwrap();
    let rules = RuleSet::from_json(PARKING_RULES).unwrap();
    let report = engine::run(&mut conn, &rules, date("2000-05-01"), None).unwrap();
    assert!(!report.saved);
    drop(conn);

    // reopen fresh: the posting still sits in Undefined
    let conn = db::open_ledger(&path).unwrap();
    assert_eq!(balance(&conn, "Undefined"), Decimal::from(5));
}
