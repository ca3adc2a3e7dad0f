// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{Account, Split, Transaction};

/// Hierarchy separator for account paths, e.g. `Expenses:Auto:Parking`.
pub const SEPARATOR: char = ':';

/// Top-level sentinel account meaning "not yet categorized".
pub const UNDEFINED_ACCOUNT: &str = "Undefined";

pub type AccountId = i64;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("ledger has no root account")]
    NoRootAccount,
    #[error("ledger has more than one root account")]
    MultipleRoots,
    #[error("split {split_id} has unparsable amount '{raw}'")]
    BadAmount { split_id: i64, raw: String },
}

/// In-memory snapshot of the accounts table. Read-only for the duration of
/// a run; reloaded per run.
pub struct AccountTree {
    root: AccountId,
    nodes: HashMap<AccountId, Account>,
    children: HashMap<AccountId, HashMap<String, AccountId>>,
}

impl AccountTree {
    pub fn load(conn: &Connection) -> Result<Self, LedgerError> {
        let mut stmt = conn.prepare("SELECT id, parent_id, name FROM accounts")?;
        let rows = stmt.query_map([], |r| {
            Ok(Account {
                id: r.get(0)?,
                parent_id: r.get(1)?,
                name: r.get(2)?,
            })
        })?;

        let mut root = None;
        let mut nodes = HashMap::new();
        let mut children: HashMap<AccountId, HashMap<String, AccountId>> = HashMap::new();
        for row in rows {
            let account = row?;
            match account.parent_id {
                None => {
                    if root.replace(account.id).is_some() {
                        return Err(LedgerError::MultipleRoots);
                    }
                }
                Some(parent) => {
                    children
                        .entry(parent)
                        .or_default()
                        .insert(account.name.clone(), account.id);
                }
            }
            nodes.insert(account.id, account);
        }

        Ok(AccountTree {
            root: root.ok_or(LedgerError::NoRootAccount)?,
            nodes,
            children,
        })
    }

    pub fn root(&self) -> AccountId {
        self.root
    }

    /// Resolve a colon-delimited path to an account, one exact child lookup
    /// per segment starting at the root. `None` if the path is empty or any
    /// segment fails to resolve; no partial results.
    pub fn resolve(&self, path: &str) -> Option<AccountId> {
        if path.is_empty() {
            return None;
        }
        let mut current = self.root;
        for segment in path.split(SEPARATOR) {
            current = *self.children.get(&current)?.get(segment)?;
        }
        Some(current)
    }

    /// Canonical fully-qualified name: parent chain joined with `:`, the
    /// root excluded. The root itself has the empty qualified name.
    pub fn qualified_name(&self, id: AccountId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(&c)) {
            if node.parent_id.is_none() {
                break;
            }
            segments.push(node.name.as_str());
            current = node.parent_id;
        }
        segments.reverse();
        segments.join(&SEPARATOR.to_string())
    }

    /// Distance from the root; the root is at depth 0.
    pub fn depth(&self, id: AccountId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            match node.parent_id {
                None => break,
                Some(parent) => {
                    depth += 1;
                    current = self.nodes.get(&parent);
                }
            }
        }
        depth
    }

    pub fn undefined_account(&self) -> Option<AccountId> {
        self.resolve(UNDEFINED_ACCOUNT)
    }

    /// All account ids except the synthetic root, in no particular order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.nodes
            .keys()
            .copied()
            .filter(|id| *id != self.root)
            .collect()
    }
}

fn parse_amount(split_id: i64, raw: &str) -> Result<Decimal, LedgerError> {
    raw.parse().map_err(|_| LedgerError::BadAmount {
        split_id,
        raw: raw.to_string(),
    })
}

/// All splits booked to an account, paired with their parent transaction,
/// in insertion (id) order.
pub fn account_splits(
    conn: &Connection,
    account: AccountId,
) -> Result<Vec<(Split, Transaction)>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.tx_id, s.account_id, s.amount, s.memo, t.date, t.description
         FROM splits s JOIN transactions t ON t.id = s.tx_id
         WHERE s.account_id = ?1 ORDER BY s.id",
    )?;
    let rows = stmt.query_map(params![account], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, chrono::NaiveDate>(5)?,
            r.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, tx_id, account_id, amount_raw, memo, date, description) = row?;
        let amount = parse_amount(id, &amount_raw)?;
        out.push((
            Split {
                id,
                tx_id,
                account_id,
                amount,
                memo,
            },
            Transaction {
                id: tx_id,
                date,
                description,
            },
        ));
    }
    Ok(out)
}

/// All legs of one transaction, in insertion (id) order.
pub fn transaction_splits(conn: &Connection, tx_id: i64) -> Result<Vec<Split>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT id, tx_id, account_id, amount, memo FROM splits WHERE tx_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![tx_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, i64>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, tx_id, account_id, amount_raw, memo) = row?;
        let amount = parse_amount(id, &amount_raw)?;
        out.push(Split {
            id,
            tx_id,
            account_id,
            amount,
            memo,
        });
    }
    Ok(out)
}

/// Sum of the account's own split amounts (children not included).
pub fn account_balance(conn: &Connection, account: AccountId) -> Result<Decimal, LedgerError> {
    let mut stmt = conn.prepare("SELECT id, amount FROM splits WHERE account_id = ?1")?;
    let rows = stmt.query_map(params![account], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut total = Decimal::ZERO;
    for row in rows {
        let (id, raw) = row?;
        total += parse_amount(id, &raw)?;
    }
    Ok(total)
}
