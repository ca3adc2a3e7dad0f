// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn ledger_arg() -> Arg {
    Arg::new("file")
        .short('f')
        .long("input-file")
        .required(true)
        .help("Ledger file")
}

fn rules_arg() -> Arg {
    Arg::new("rules")
        .short('r')
        .long("rule-file")
        .required(true)
        .help("Rule definition file (JSON; // and /* */ comments allowed)")
}

pub fn build_cli() -> Command {
    Command::new("recat")
        .version(crate_version!())
        .about("Regex-driven recategorization of Undefined postings in double-entry ledgers")
        .subcommand(
            Command::new("init")
                .about("Create an empty ledger file")
                .arg(ledger_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Recategorize Undefined postings using a rule file")
                .arg(ledger_arg())
                .arg(rules_arg())
                .arg(
                    Arg::new("start")
                        .short('s')
                        .long("start-date")
                        .required(true)
                        .help("Start date (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("end")
                        .short('e')
                        .long("end-date")
                        .help("End date (YYYY-MM-DD, inclusive); postings after it are left alone"),
                )
                .arg(
                    Arg::new("inplace")
                        .long("inplace")
                        .action(ArgAction::SetTrue)
                        .help("Don't create a backup of the ledger file"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("verbose")
                        .help("Suppress output"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Verbose output"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the run report as JSON"),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("Inspect and validate rule files")
                .subcommand(
                    Command::new("list")
                        .about("List the rules in a rule file")
                        .arg(rules_arg()),
                )
                .subcommand(
                    Command::new("check")
                        .about("Validate a rule file against a ledger's accounts")
                        .arg(rules_arg())
                        .arg(ledger_arg()),
                ),
        )
        .subcommand(
            Command::new("accounts").about("Inspect ledger accounts").subcommand(
                Command::new("list")
                    .about("List accounts and balances")
                    .arg(ledger_arg())
                    .arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
                    .arg(Arg::new("jsonl").long("jsonl").action(ArgAction::SetTrue)),
            ),
        )
}
