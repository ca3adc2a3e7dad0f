// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, Transaction, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::ledger::{
    AccountId, AccountTree, LedgerError, account_splits, transaction_splits,
};
use crate::models::Split;
use crate::rules::{Rule, RuleError, RuleSet, select_most_urgent};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("ledger database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error(
        "transaction {tx_id} has {count} postings; only two-posting transactions can be recategorized"
    )]
    UnsupportedSplitTransaction { tx_id: i64, count: usize },
    #[error("destination account '{path}' does not exist in the ledger")]
    DestinationNotFound { path: String },
    #[error("transaction {tx_id} has no remaining Undefined posting to reassign")]
    UndefinedLegMissing { tx_id: i64 },
}

/// A posting eligible for recategorization: a debit in a rule's source
/// account whose counter-leg still sits in the Undefined account.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub split: Split,
    pub date: NaiveDate,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Reassigned {
        date: NaiveDate,
        description: String,
        amount: Decimal,
        rule: String,
        source: String,
        dest: String,
    },
    NoMatch {
        date: NaiveDate,
        description: String,
        source: String,
    },
}

/// Ordered record of one run, returned to the caller to drain: no global
/// logger, no side effects beyond the ledger itself.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub scanned: usize,
    pub reassigned: usize,
    pub unmatched: usize,
    pub saved: bool,
    pub events: Vec<Event>,
}

impl RunReport {
    fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        RunReport {
            start,
            end,
            scanned: 0,
            reassigned: 0,
            unmatched: 0,
            saved: false,
            events: Vec::new(),
        }
    }
}

/// Candidate postings of one source account, in the ledger's own insertion
/// order. Postings dated after `end` (inclusive bound) are excluded when an
/// end date is given; the start date deliberately does not filter. Each
/// posting is returned at most once however many conditions qualify it.
pub fn candidates(
    conn: &Connection,
    tree: &AccountTree,
    source: AccountId,
    end: Option<NaiveDate>,
) -> Result<Vec<Candidate>, EngineError> {
    let undefined = match tree.undefined_account() {
        Some(id) => id,
        None => return Ok(Vec::new()),
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (split, txn) in account_splits(conn, source)? {
        if let Some(end) = end {
            if txn.date > end {
                continue;
            }
        }
        if split.amount >= Decimal::ZERO {
            continue;
        }
        let legs = transaction_splits(conn, split.tx_id)?;
        let counter_undefined = legs
            .iter()
            .any(|leg| leg.id != split.id && leg.account_id == undefined);
        if !counter_undefined {
            continue;
        }
        if seen.insert(split.id) {
            out.push(Candidate {
                split,
                date: txn.date,
                description: txn.description,
            });
        }
    }
    Ok(out)
}

/// Move the candidate's Undefined-side leg to the rule's destination
/// account, as one savepoint-scoped edit: any exit that is not the final
/// commit rolls the savepoint back. Amounts are never touched, so the
/// two-leg sum stays zero by construction.
fn reassign(
    tx: &mut Transaction<'_>,
    tree: &AccountTree,
    undefined: AccountId,
    candidate: &Candidate,
    rule: &Rule,
) -> Result<(), EngineError> {
    // Already validated against this tree, but resolution is re-checked at
    // mutation time before anything is written.
    let dest = tree
        .resolve(&rule.dest)
        .filter(|id| tree.qualified_name(*id) == rule.dest)
        .ok_or_else(|| EngineError::DestinationNotFound {
            path: rule.dest.clone(),
        })?;

    let sp = tx.savepoint()?;

    let legs = transaction_splits(&sp, candidate.split.tx_id)?;
    if legs.len() != 2 {
        return Err(EngineError::UnsupportedSplitTransaction {
            tx_id: candidate.split.tx_id,
            count: legs.len(),
        });
    }
    let undefined_leg = legs
        .into_iter()
        .find(|leg| leg.id != candidate.split.id && leg.account_id == undefined)
        .ok_or(EngineError::UndefinedLegMissing {
            tx_id: candidate.split.tx_id,
        })?;

    sp.execute(
        "UPDATE splits SET account_id = ?1 WHERE id = ?2",
        params![dest, undefined_leg.id],
    )?;
    sp.commit()?;
    Ok(())
}

/// Drive the whole pipeline: validate the rule set against the ledger,
/// resolve the distinct source accounts, classify and reassign each
/// account's candidate postings, and commit only if something changed.
///
/// All mutations happen inside one SQL transaction; any error unwinds it,
/// so a failed run leaves the ledger byte-for-byte as it was. When zero
/// postings are reassigned the transaction is rolled back and persistence
/// is never invoked.
pub fn run(
    conn: &mut Connection,
    rules: &RuleSet,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<RunReport, EngineError> {
    let tree = AccountTree::load(conn)?;
    rules.validate(&tree)?;
    let sources = rules.source_accounts(&tree)?;

    let mut report = RunReport::new(start, end);
    let undefined = match tree.undefined_account() {
        Some(id) => id,
        // No sentinel account means nothing is awaiting categorization.
        None => return Ok(report),
    };

    let mut tx = conn.transaction()?;
    for source in &sources {
        let source_name = tree.qualified_name(*source);
        for candidate in candidates(&tx, &tree, *source, end)? {
            report.scanned += 1;
            let matches = rules.matching(&candidate.description);
            match select_most_urgent(&matches) {
                Some(rule) => {
                    reassign(&mut tx, &tree, undefined, &candidate, rule)?;
                    report.reassigned += 1;
                    report.events.push(Event::Reassigned {
                        date: candidate.date,
                        description: candidate.description.clone(),
                        amount: candidate.split.amount,
                        rule: rule.name.clone(),
                        source: source_name.clone(),
                        dest: rule.dest.clone(),
                    });
                }
                None => {
                    report.unmatched += 1;
                    report.events.push(Event::NoMatch {
                        date: candidate.date,
                        description: candidate.description.clone(),
                        source: source_name.clone(),
                    });
                }
            }
        }
    }

    if report.reassigned > 0 {
        tx.commit()?;
        report.saved = true;
    } else {
        tx.rollback()?;
    }
    Ok(report)
}
