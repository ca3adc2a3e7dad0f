// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db;
use crate::ledger::{AccountTree, account_balance};
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct AccountRow {
    account: String,
    balance: String,
}

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(sub),
        _ => Ok(()),
    }
}

fn list(sub: &clap::ArgMatches) -> Result<()> {
    let ledger_path = sub.get_one::<String>("file").unwrap();
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");

    let conn = db::open_ledger(ledger_path)?;
    let tree = AccountTree::load(&conn)?;

    let mut data = Vec::new();
    for id in tree.account_ids() {
        let balance = account_balance(&conn, id)?;
        data.push(AccountRow {
            account: tree.qualified_name(id),
            balance: balance.round_dp(2).to_string(),
        });
    }
    data.sort_by(|a, b| a.account.cmp(&b.account));

    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .into_iter()
            .map(|r| vec![r.account, r.balance])
            .collect();
        println!("{}", pretty_table(&["Account", "Balance"], rows));
    }
    Ok(())
}
