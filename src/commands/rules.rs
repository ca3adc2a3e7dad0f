// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::ledger::AccountTree;
use crate::rules::RuleSet;
use crate::utils::pretty_table;
use anyhow::{Context, Result};

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(sub),
        Some(("check", sub)) => check(sub),
        _ => Ok(()),
    }
}

fn list(sub: &clap::ArgMatches) -> Result<()> {
    let rule_path = sub.get_one::<String>("rules").unwrap();
    let rules = RuleSet::load(rule_path)
        .with_context(|| format!("Load rules from {}", rule_path))?;

    let data = rules
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.pattern.as_str().to_string(),
                r.priority.to_string(),
                r.src.clone(),
                r.dest.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Name", "Pattern", "Priority", "Source", "Dest"], data)
    );
    Ok(())
}

fn check(sub: &clap::ArgMatches) -> Result<()> {
    let rule_path = sub.get_one::<String>("rules").unwrap();
    let ledger_path = sub.get_one::<String>("file").unwrap();

    let rules = RuleSet::load(rule_path)
        .with_context(|| format!("Load rules from {}", rule_path))?;
    let conn = db::open_ledger(ledger_path)?;
    let tree = AccountTree::load(&conn)?;
    rules.validate(&tree)?;
    let sources = rules.source_accounts(&tree)?;

    println!(
        "✅ {} rules valid against {} ({} source accounts)",
        rules.len(),
        ledger_path,
        sources.len()
    );
    Ok(())
}
