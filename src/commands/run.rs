// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::engine::{self, Event, RunReport};
use crate::rules::RuleSet;
use crate::utils::{parse_date, pretty_table};
use anyhow::{Context, Result};
use std::fs;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    let ledger_path = m.get_one::<String>("file").unwrap();
    let rule_path = m.get_one::<String>("rules").unwrap();
    let start = parse_date(m.get_one::<String>("start").unwrap())?;
    let end = m
        .get_one::<String>("end")
        .map(|s| parse_date(s))
        .transpose()?;
    let inplace = m.get_flag("inplace");
    let quiet = m.get_flag("quiet");
    let verbose = m.get_flag("verbose");
    let json = m.get_flag("json");

    // Rules are loaded and checked for shape before the ledger is touched.
    let rules = RuleSet::load(rule_path)
        .with_context(|| format!("Load rules from {}", rule_path))?;

    if !inplace {
        let backup = format!("{}.bak", ledger_path);
        fs::copy(ledger_path, &backup)
            .with_context(|| format!("Copy ledger {} to {}", ledger_path, backup))?;
        if !quiet && !json {
            println!("Copied ledger {} to {}", ledger_path, backup);
        }
    }

    let mut conn = db::open_ledger(ledger_path)?;
    let report = engine::run(&mut conn, &rules, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if !quiet {
        print_report(&report, verbose);
    }
    Ok(())
}

fn print_report(report: &RunReport, verbose: bool) {
    let mut rows = Vec::new();
    for event in &report.events {
        match event {
            Event::Reassigned {
                date,
                description,
                amount,
                rule,
                dest,
                ..
            } => rows.push(vec![
                date.to_string(),
                description.clone(),
                amount.to_string(),
                rule.clone(),
                dest.clone(),
            ]),
            Event::NoMatch {
                date,
                description,
                source,
            } => {
                if verbose {
                    println!("No rule matches '{}' ({} in {})", description, date, source);
                }
            }
        }
    }
    if !rows.is_empty() {
        println!(
            "{}",
            pretty_table(&["Date", "Description", "Amount", "Rule", "Dest"], rows)
        );
    }
    println!(
        "Scanned {} candidate postings: {} reassigned, {} unmatched",
        report.scanned, report.reassigned, report.unmatched
    );
    if report.saved {
        println!("Ledger saved");
    } else {
        println!("Nothing to reassign; ledger left untouched");
    }
}
