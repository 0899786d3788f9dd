// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Line-oriented recipe parser.
//!
//! The recogniser table is a fixed, explicitly ordered array of
//! `(name, regex)` pairs rather than anything reflection-discovered: blank
//! lines are already filtered out by the caller, and every remaining line is
//! tried against the table in order until one fires.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::env;
use crate::recipe::Recipe;
use crate::target::Target;

/// Attribute names recognised by the driver.
const KNOWN_ATTRS: &[&str] = &["N", "v", "depend", "S", "l", "queue"];

static RE_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_$%][A-Za-z0-9_]*)\s*(\+=|\?=|=)\s*(.*)$").unwrap());
// Target names are allowed to contain the punctuation a pattern target or an
// interpolated name needs ("compress-%", "a-%-b", "build-${SUFFIX}"), unlike
// a plain variable NAME: only the leading character is constrained, not the
// whole identifier.
static RE_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_$%][^\s:]*)(?:::([A-Za-z_][A-Za-z0-9_]*))?\s*:\s*(.*)$").unwrap());
static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(.*)$").unwrap());
static RE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\t@([A-Za-z_][A-Za-z0-9_]*)\s+(.*)$").unwrap());
static RE_CMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\t(.*)$").unwrap());

pub fn parse(source: &str, env: env::Env) -> Result<Recipe, Error> {
    let mut recipe = Recipe::new(env);
    let mut current: Option<String> = None;

    for raw_line in source.lines() {
        let line = raw_line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = RE_ASSIGN.captures(line) {
            let name = &caps[1];
            let op = &caps[2];
            let value = strip_quotes(&caps[3]);

            let interpolated = recipe.env.interp(value, false)?;
            let expanded = recipe.env.shell_capture(&interpolated)?;

            match op {
                "=" => recipe.env.set(name, expanded),
                "+=" => {
                    let mut combined = recipe.env.get_or_default(name);
                    combined.push_str(&expanded);
                    recipe.env.set(name, combined);
                }
                "?=" => {
                    if !recipe.env.has_local(name) {
                        recipe.env.set(name, expanded);
                    }
                }
                _ => unreachable!("RE_ASSIGN only captures =, += or ?="),
            }
        } else if let Some(caps) = RE_TARGET.captures(line) {
            let name = recipe.env.interp(&caps[1], true)?;
            let kind = caps.get(2).map(|m| m.as_str().to_string());
            let components_raw = recipe.env.interp(&caps[3], true)?;
            let components = components_raw.split_whitespace().map(str::to_string).collect();

            let mut target = Target::new(name, kind);
            target.components = components;
            current = Some(target.canonical_name.clone());
            recipe.insert(target);
        } else if RE_COMMENT.is_match(line) {
            // Comments carry no state.
        } else if let Some(caps) = RE_ATTR.captures(line) {
            let attr = &caps[1];
            let value = caps[2].to_string();

            if !KNOWN_ATTRS.contains(&attr) {
                return Err(Error::UnknownAttribute(attr.to_string()));
            }

            let name = current.clone().ok_or_else(|| Error::NoCurrentTarget(line.to_string()))?;
            let target = recipe.get_mut(&name).expect("current always names an inserted target");
            target.attrs.insert(attr.to_string(), value);
        } else if let Some(caps) = RE_CMD.captures(line) {
            let name = current.clone().ok_or_else(|| Error::NoCurrentTarget(line.to_string()))?;
            let target = recipe.get_mut(&name).expect("current always names an inserted target");
            target.cmds.push(caps[1].to_string());
        } else {
            return Err(Error::UnrecognisedLine(line.to_string()));
        }
    }

    Ok(recipe)
}

/// Strip one layer of matching single or double quotes, if present.
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognised line: {0}")]
    UnrecognisedLine(String),
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("attribute or command line with no open target: {0}")]
    NoCurrentTarget(String),
    #[error("interpolation")]
    Env(#[from] env::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::Env;

    fn parse_str(source: &str) -> Recipe {
        parse(source, Env::default()).unwrap()
    }

    #[test]
    fn plain_assign() {
        let recipe = parse_str("X = hello\n");
        assert_eq!(recipe.env.get("X").unwrap(), "hello");
    }

    #[test]
    fn quoted_value_is_stripped() {
        let recipe = parse_str("X = \"hello world\"\n");
        assert_eq!(recipe.env.get("X").unwrap(), "hello world");
    }

    #[test]
    fn append_to_unset_variable() {
        let recipe = parse_str("X += hello\n");
        assert_eq!(recipe.env.get("X").unwrap(), "hello");
    }

    #[test]
    fn append_to_set_variable() {
        let recipe = parse_str("X = a\nX += b\n");
        assert_eq!(recipe.env.get("X").unwrap(), "ab");
    }

    #[test]
    fn conditional_only_sets_once() {
        let recipe = parse_str("X = a\nX ?= b\n");
        assert_eq!(recipe.env.get("X").unwrap(), "a");
    }

    #[test]
    fn conditional_sets_when_absent() {
        let recipe = parse_str("X ?= b\n");
        assert_eq!(recipe.env.get("X").unwrap(), "b");
    }

    #[test]
    fn target_with_default_kind() {
        let recipe = parse_str("A: B C\n\techo hi\n");
        let target = recipe.get("A").unwrap();
        assert_eq!(target.kind, "afterok");
        assert_eq!(target.components, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(target.cmds, vec!["echo hi".to_string()]);
    }

    #[test]
    fn target_with_explicit_kind() {
        let recipe = parse_str("job::afternotok:\n\techo recovery\n");
        let target = recipe.get("job::afternotok").unwrap();
        assert_eq!(target.kind, "afternotok");
        assert_eq!(target.base_name, "job");
    }

    #[test]
    fn target_with_no_components() {
        let recipe = parse_str("C:\n\techo C\n");
        assert!(recipe.get("C").unwrap().components.is_empty());
    }

    #[test]
    fn first_non_pattern_target_is_default() {
        let recipe = parse_str("compress-%:\n\tgzip ${pm_target_match}\nA:\n\ttrue\nB:\n\ttrue\n");
        assert_eq!(recipe.default.as_deref(), Some("A"));
    }

    #[test]
    fn comment_is_ignored() {
        let recipe = parse_str("# a comment\nA:\n\ttrue\n");
        assert_eq!(recipe.targets.len(), 1);
    }

    #[test]
    fn attr_line_is_recorded() {
        let recipe = parse_str("A:\n\t@N myjob\n\ttrue\n");
        assert_eq!(recipe.get("A").unwrap().attrs.get("N").unwrap(), "myjob");
    }

    #[test]
    fn unknown_attribute_fails() {
        let err = parse("A:\n\t@bogus x\n", Env::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute(name) if name == "bogus"));
    }

    #[test]
    fn attr_before_target_fails() {
        let err = parse("\t@N x\n", Env::default()).unwrap_err();
        assert!(matches!(err, Error::NoCurrentTarget(_)));
    }

    #[test]
    fn unrecognised_line_fails() {
        let err = parse("!!!not valid\n", Env::default()).unwrap_err();
        assert!(matches!(err, Error::UnrecognisedLine(_)));
    }

    #[test]
    fn pattern_target_defers_match_interpolation() {
        let recipe = parse_str("compress-%:\n\tgzip ${pm_target_match}\n");
        let target = recipe.get("compress-%").unwrap();
        assert_eq!(target.cmds, vec!["gzip ${pm_target_match}".to_string()]);
    }

    #[test]
    fn hyphenated_pattern_targets_parse() {
        let recipe = parse_str("a-%:\n\ttrue\na-%-b:\n\ttrue\n");
        assert!(recipe.get("a-%").unwrap().is_pattern());
        assert!(recipe.get("a-%-b").unwrap().is_pattern());
    }

    #[test]
    fn target_name_interpolates_variables() {
        let recipe = parse_str("SUFFIX = foo\nbuild-${SUFFIX}:\n\ttrue\n");
        assert!(recipe.get("build-foo").is_some());
    }
}
