// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Target resolver: pattern-target matching, dependency closure, and
//! per-target environment derivation.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::plan::Plan;
use crate::recipe::Recipe;
use crate::target::Target;

/// Resolve `requested` build targets against `recipe` into a closed,
/// pruned [`Plan`], materialising any pattern targets needed along the way.
pub fn build(recipe: &Recipe, requested: &[String], cwd: &Path) -> Result<Plan, Error> {
    let mut plan = Plan::default();
    let mut resolved: HashSet<String> = HashSet::new();
    let mut worklist: VecDeque<String> = requested.iter().cloned().collect();

    while let Some(name) = worklist.pop_front() {
        if resolved.contains(&name) {
            continue;
        }
        resolved.insert(name.clone());

        let target = if let Some(existing) = recipe.get(&name) {
            existing.clone()
        } else {
            materialise(recipe, &name)?
        };

        worklist.extend(target.components.iter().cloned());
        plan.targets.insert(name, target);
    }

    // A named-kind sibling (`base::kind`) of a resolved target, such as
    // `job::afternotok` alongside `job`, is never a dependency component of
    // anything, so the closure above never reaches it. The submission
    // driver's post-schedule sweep still needs to find it in the plan, so it
    // is carried over here without joining `resolved`: it never becomes
    // part of the DFS schedule itself.
    let siblings: Vec<String> = recipe
        .targets
        .values()
        .filter(|target| target.kind != crate::target::DEFAULT_KIND && resolved.contains(&target.base_name))
        .map(|target| target.canonical_name.clone())
        .collect();

    for name in siblings {
        plan.targets
            .entry(name.clone())
            .or_insert_with(|| recipe.get(&name).expect("named in recipe.targets").clone());
    }

    for target in plan.targets.values_mut() {
        derive_env(recipe, target, cwd);
    }

    Ok(plan)
}

/// Materialise a concrete target from the shortest-capture matching pattern
/// target, substituting `%` in every component with the captured string.
fn materialise(recipe: &Recipe, name: &str) -> Result<Target, Error> {
    let mut best: Option<(&Target, String)> = None;

    for pattern in recipe.patterns() {
        let Some(captured) = match_pattern(&pattern.canonical_name, name) else {
            continue;
        };

        let shorter = best.as_ref().map_or(true, |(_, current)| captured.len() < current.len());
        if shorter {
            best = Some((pattern, captured));
        }
    }

    let (pattern, captured) = best.ok_or_else(|| Error::UnresolvedTarget(name.to_string()))?;

    let mut target = pattern.clone();
    target.canonical_name = name.to_string();
    target.base_name = name.to_string();
    target.components = pattern.components.iter().map(|c| c.replace('%', &captured)).collect();
    target.pm_target_match = Some(captured);

    Ok(target)
}

/// Build the regex a pattern target's name matches against: the single `%`
/// becomes one `(\S+)` capturing group, anchored start-to-end, with the
/// literal prefix/suffix escaped.
fn match_pattern(pattern_name: &str, candidate: &str) -> Option<String> {
    let idx = pattern_name.find('%')?;
    let (prefix, suffix) = (&pattern_name[..idx], &pattern_name[idx + 1..]);
    let expr = format!("^{}(\\S+){}$", regex::escape(prefix), regex::escape(suffix));
    let re = Regex::new(&expr).ok()?;
    re.captures(candidate).map(|caps| caps[1].to_string())
}

fn derive_env(recipe: &Recipe, target: &mut Target, cwd: &Path) {
    let mut env = recipe.env.deep_copy();
    env.set("pm_target_name", target.canonical_name.clone());
    env.set_default("PBS_O_WORKDIR", cwd.to_string_lossy().into_owned());
    if let Some(captured) = &target.pm_target_match {
        env.set(crate::env::TARGET_MATCH, captured.clone());
    }
    target.env = env;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unresolved build target: {0}")]
    UnresolvedTarget(String),
}
