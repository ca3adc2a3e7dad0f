// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use std::path::Path;

use crate::ledger::UNDEFINED_ACCOUNT;

/// Open an existing ledger file. The ledger must have been created with
/// `create_ledger` (or `recat init`); opening a missing file is an error
/// rather than an implicit create.
pub fn open_ledger<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    if !path.exists() {
        bail!(
            "Ledger file {} does not exist (run `recat init -f {}` to create one)",
            path.display(),
            path.display()
        );
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Open ledger at {}", path.display()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

pub fn create_ledger<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("Create ledger at {}", path.as_ref().display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER, -- NULL only for the synthetic root
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(parent_id, name),
        FOREIGN KEY(parent_id) REFERENCES accounts(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS splits(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tx_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        memo TEXT,
        FOREIGN KEY(tx_id) REFERENCES transactions(id) ON DELETE CASCADE,
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_splits_account ON splits(account_id);
    CREATE INDEX IF NOT EXISTS idx_splits_tx ON splits(tx_id);
    "#,
    )?;

    let roots: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE parent_id IS NULL",
        [],
        |r| r.get(0),
    )?;
    if roots == 0 {
        conn.execute("INSERT INTO accounts(parent_id, name) VALUES (NULL, 'Root')", [])?;
        let root_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO accounts(parent_id, name) VALUES (?1, ?2)",
            params![root_id, UNDEFINED_ACCOUNT],
        )?;
    }
    Ok(())
}
