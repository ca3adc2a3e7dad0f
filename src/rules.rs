// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::ledger::{AccountId, AccountTree};

/// Which account path of a rule is being referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSide {
    Source,
    Destination,
}

impl fmt::Display for RuleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSide::Source => write!(f, "source"),
            RuleSide::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
    #[error("rule file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rule file must be a JSON object keyed by rule name")]
    NotAnObject,
    #[error("rule '{rule}': invalid definition: {detail}")]
    MalformedRule { rule: String, detail: String },
    #[error("rule '{rule}': invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("rule '{rule}': no source account given and the rule file has no default \"src\"")]
    MissingSourceAccount { rule: String },
    #[error("rule '{rule}': {side} account '{path}' does not exist in the ledger")]
    AccountNotFound {
        rule: String,
        side: RuleSide,
        path: String,
    },
    #[error("no rule references a usable source account")]
    NoSourceAccounts,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub pattern: Regex,
    pub priority: i64,
    pub src: String,
    pub dest: String,
}

impl Rule {
    pub fn account_path(&self, side: RuleSide) -> &str {
        match side {
            RuleSide::Source => &self.src,
            RuleSide::Destination => &self.dest,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    regex: String,
    priority: i64,
    dest: String,
    #[serde(default)]
    src: Option<String>,
}

/// Immutable, validated-at-load collection of categorization rules, held in
/// sorted-name order so iteration and error reporting are stable.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RuleError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a rule file: a JSON object mapping rule name to
    /// `{regex, priority, dest, src?}`, plus an optional top-level "src"
    /// string naming the default source account. The file is hand-edited,
    /// so `//` and `/* */` comments are stripped before parsing.
    pub fn from_json(text: &str) -> Result<Self, RuleError> {
        let stripped = strip_comments(text);
        let value: serde_json::Value = serde_json::from_str(&stripped)?;
        let object = value.as_object().ok_or(RuleError::NotAnObject)?;

        // The top-level "src" entry is the default source account, not a rule.
        let default_src = match object.get("src") {
            None => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(RuleError::MalformedRule {
                    rule: "src".to_string(),
                    detail: "top-level \"src\" must be an account path string".to_string(),
                });
            }
        };

        let mut names: Vec<&String> = object.keys().filter(|k| k.as_str() != "src").collect();
        names.sort();

        let mut rules = Vec::with_capacity(names.len());
        for name in names {
            let raw: RawRule =
                serde_json::from_value(object[name].clone()).map_err(|e| RuleError::MalformedRule {
                    rule: name.clone(),
                    detail: e.to_string(),
                })?;
            if raw.dest.is_empty() {
                return Err(RuleError::MalformedRule {
                    rule: name.clone(),
                    detail: "\"dest\" must be a non-empty account path".to_string(),
                });
            }
            let src = match raw.src {
                Some(s) if !s.is_empty() => s,
                Some(_) => {
                    return Err(RuleError::MalformedRule {
                        rule: name.clone(),
                        detail: "\"src\" must be a non-empty account path".to_string(),
                    });
                }
                None => default_src
                    .clone()
                    .ok_or_else(|| RuleError::MissingSourceAccount { rule: name.clone() })?,
            };
            let pattern = Regex::new(&raw.regex).map_err(|e| RuleError::InvalidPattern {
                rule: name.clone(),
                pattern: raw.regex.clone(),
                source: e,
            })?;
            rules.push(Rule {
                name: name.clone(),
                pattern,
                priority: raw.priority,
                src,
                dest: raw.dest,
            });
        }

        Ok(RuleSet { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Require every rule's source and destination paths to resolve, and the
    /// resolved account's recomputed qualified name to equal the path
    /// exactly. A resolution whose qualified name differs is a non-match.
    pub fn validate(&self, tree: &AccountTree) -> Result<(), RuleError> {
        for rule in &self.rules {
            for side in [RuleSide::Source, RuleSide::Destination] {
                let path = rule.account_path(side);
                let resolved = tree
                    .resolve(path)
                    .filter(|id| tree.qualified_name(*id) == path);
                if resolved.is_none() {
                    return Err(RuleError::AccountNotFound {
                        rule: rule.name.clone(),
                        side,
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Distinct resolved source accounts across all rules, in stable id
    /// order. An empty result is a hard precondition failure, not a no-op.
    pub fn source_accounts(&self, tree: &AccountTree) -> Result<Vec<AccountId>, RuleError> {
        let mut distinct = BTreeSet::new();
        for rule in &self.rules {
            if let Some(id) = tree.resolve(&rule.src) {
                distinct.insert(id);
            }
        }
        if distinct.is_empty() {
            return Err(RuleError::NoSourceAccounts);
        }
        Ok(distinct.into_iter().collect())
    }

    /// All rules whose pattern matches at the start of the description
    /// (prefix semantics: anchored at position 0, not a full-string match).
    /// The order of the result is unspecified.
    pub fn matching(&self, description: &str) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| matches_at_start(&rule.pattern, description))
            .collect()
    }
}

fn matches_at_start(pattern: &Regex, haystack: &str) -> bool {
    // find() returns the leftmost match, so a zero start position is
    // equivalent to "some match begins at the first byte".
    pattern.find(haystack).is_some_and(|m| m.start() == 0)
}

/// Highest priority wins; equal priority is broken by rule name, ascending.
/// `None` when nothing matched -- callers leave the posting unchanged.
pub fn select_most_urgent<'a>(matches: &[&'a Rule]) -> Option<&'a Rule> {
    matches.iter().copied().min_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.name.cmp(&b.name))
    })
}

/// Strip `//` line comments and `/* */` block comments outside of JSON
/// strings. Newlines are preserved so parse errors keep their line numbers.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        if next == '\n' {
                            out.push('\n');
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}
