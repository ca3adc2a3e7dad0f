// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use recat::{cli, commands, db};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("init", sub)) => {
            let path = sub.get_one::<String>("file").unwrap();
            db::create_ledger(path)?;
            println!("Ledger initialized at {}", path);
        }
        Some(("run", sub)) => commands::run::handle(sub)?,
        Some(("rules", sub)) => commands::rules::handle(sub)?,
        Some(("accounts", sub)) => commands::accounts::handle(sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
