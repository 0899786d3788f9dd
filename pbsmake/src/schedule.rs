// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Submission-order scheduler: depth-first post-order traversal from
//! each requested target, de-duplicated, with on-path cycle detection.
//!
//! This walks the [`crate::plan::Plan`]'s own adjacency directly rather than
//! going through `dag::Dag`: that type's `add_edge` silently refuses any
//! edge that would close a cycle, which is the opposite of what
//! [`Error::DependencyCycle`] needs (the exact list of nodes on the cycle).
//! `dag::Dag` is reused instead by the graph backend, which only ever walks
//! a schedule already proven acyclic.

use thiserror::Error;

use crate::plan::Plan;

/// Produce the linear submission order for `requested`, rooted at each name
/// in turn, concatenated and de-duplicated.
pub fn order(plan: &Plan, requested: &[String]) -> Result<Vec<String>, Error> {
    let mut schedule = Vec::new();
    let mut done = std::collections::HashSet::new();
    let mut path = Vec::new();

    for root in requested {
        visit(plan, root, &mut schedule, &mut done, &mut path)?;
    }

    Ok(schedule)
}

fn visit(
    plan: &Plan,
    name: &str,
    schedule: &mut Vec<String>,
    done: &mut std::collections::HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), Error> {
    if done.contains(name) {
        return Ok(());
    }

    if let Some(pos) = path.iter().position(|n| n == name) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(name.to_string());
        return Err(Error::DependencyCycle(cycle));
    }

    path.push(name.to_string());

    if let Some(target) = plan.get(name) {
        for component in &target.components {
            visit(plan, component, schedule, done, path)?;
        }
    }

    path.pop();
    done.insert(name.to_string());
    schedule.push(name.to_string());

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}
