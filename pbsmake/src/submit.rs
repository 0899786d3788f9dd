// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Submission driver: materialises task files, builds per-job attribute
//! sets, threads dependency ids through the schedule, and dispatches each
//! target to the selected [`crate::backend::Backend`].

use std::collections::HashSet;
use std::io::Write as _;

use indexmap::IndexMap;
use itertools::Itertools;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::backend::{self, Backend};
use crate::env;
use crate::plan::Plan;
use crate::target::{Target, DEFAULT_KIND};

/// Submit every target in `schedule`, in order, through `backend`, then run
/// the post-schedule sweep for named-kind variants left out of it.
pub fn run(
    plan: &mut Plan,
    schedule: &[String],
    backend: &mut dyn Backend,
    queue: Option<&str>,
) -> Result<(), Error> {
    for name in schedule {
        submit_one(plan, name, backend, queue, None)?;
    }

    sweep(plan, schedule, backend, queue)
}

fn sweep(plan: &mut Plan, schedule: &[String], backend: &mut dyn Backend, queue: Option<&str>) -> Result<(), Error> {
    let scheduled: HashSet<&str> = schedule.iter().map(String::as_str).collect();

    let stragglers: Vec<(String, String)> = plan
        .targets
        .values()
        .filter(|target| target.kind != DEFAULT_KIND && !scheduled.contains(target.canonical_name.as_str()))
        .map(|target| (target.canonical_name.clone(), target.base_name.clone()))
        .collect();

    for (name, base_name) in stragglers {
        let Some(parent_id) = plan.get(&base_name).and_then(|parent| parent.submission_id.clone()) else {
            continue;
        };

        submit_one(plan, &name, backend, queue, Some(parent_id))?;
    }

    Ok(())
}

fn submit_one(
    plan: &mut Plan,
    name: &str,
    backend: &mut dyn Backend,
    queue: Option<&str>,
    lastid: Option<String>,
) -> Result<(), Error> {
    let target = plan.get(name).ok_or_else(|| Error::UnknownTarget(name.to_string()))?.clone();

    let task_file = write_task_file(&target)?;

    let mut attrs = target.attrs.clone();
    attrs.entry("N".to_string()).or_insert_with(|| target.canonical_name.clone());
    attrs.entry("S".to_string()).or_insert_with(|| "/bin/sh".to_string());
    attrs.entry("v".to_string()).or_insert_with(|| {
        target
            .env
            .as_flat_map()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .join(",")
    });

    let depend = dependency_clause(plan, &target, lastid.as_deref())?;
    if !depend.is_empty() {
        attrs.insert("depend".to_string(), depend);
    }

    // `queue` names a destination queue, consumed here rather than forwarded
    // as a wire attribute.
    let queue_attr = attrs.shift_remove("queue");
    let queue_value = queue_attr.as_deref().map(|value| target.env.interp(value, false)).transpose()?;
    let effective_queue = queue_value.as_deref().or(queue);

    let mut interpolated = IndexMap::new();
    for (key, value) in &attrs {
        interpolated.insert(key.clone(), target.env.interp(value, false)?);
    }

    let mut resolved = split_resource_list(interpolated);
    // Not a recipe attribute: a private channel carrying component names to
    // backends (the graph backend) that need them but never receive a real
    // submission id from one another to reconstruct them by.
    resolved.insert("__components".to_string(), target.components.join(","));

    let id = backend
        .submit(&target.canonical_name, task_file.path(), &resolved, effective_queue, lastid.as_deref())
        .map_err(Error::Backend)?;

    println!("{}({}) scheduled", target.canonical_name, id);

    if let Some(target) = plan.get_mut(name) {
        target.submission_id = Some(id);
    }

    Ok(())
}

/// Build `kind:submission_id(c)` for every component, plus `kind:lastid` if
/// one was threaded in, joined by `,`. `kind` is the submitting target's own
/// dependency kind.
fn dependency_clause(plan: &Plan, target: &Target, lastid: Option<&str>) -> Result<String, Error> {
    let mut parts = Vec::new();

    for component in &target.components {
        let dep = plan.get(component).ok_or_else(|| Error::UnknownTarget(component.clone()))?;
        let id = dep
            .submission_id
            .as_ref()
            .ok_or_else(|| Error::ComponentNotSubmitted(component.clone()))?;
        parts.push(format!("{}:{id}", target.kind));
    }

    if let Some(lastid) = lastid {
        parts.push(format!("{}:{lastid}", target.kind));
    }

    Ok(parts.join(","))
}

/// Split a comma-separated `l` (resource-list) attribute into one
/// `l:<resource>` sub-attribute per entry.
fn split_resource_list(attrs: IndexMap<String, String>) -> IndexMap<String, String> {
    let mut out = IndexMap::new();

    for (key, value) in attrs {
        if key == "l" {
            for entry in value.split(',').filter(|entry| !entry.is_empty()) {
                match entry.split_once('=') {
                    Some((resource, value)) => out.insert(format!("l:{resource}"), value.to_string()),
                    None => out.insert(format!("l:{entry}"), String::new()),
                };
            }
        } else {
            out.insert(key, value);
        }
    }

    out
}

fn write_task_file(target: &Target) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;

    for cmd in &target.cmds {
        let interpolated = target.env.interp(cmd, false)?;
        writeln!(file, "{interpolated}")?;
    }

    file.flush()?;
    Ok(file)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown target referenced during submission: {0}")]
    UnknownTarget(String),
    #[error("component not yet submitted: {0}")]
    ComponentNotSubmitted(String),
    #[error("task file")]
    TaskFile(#[from] std::io::Error),
    #[error("attribute interpolation")]
    Env(#[from] env::Error),
    #[error("backend submission failed")]
    Backend(#[source] backend::Error),
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::*;
    use crate::env::Env;
    use crate::{parser, resolve, schedule};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, IndexMap<String, String>, Option<String>, Option<String>)>,
        next_id: u32,
    }

    impl Backend for Recorder {
        fn submit(
            &mut self,
            name: &str,
            _task_file: &Path,
            attrs: &IndexMap<String, String>,
            queue: Option<&str>,
            lastid: Option<&str>,
        ) -> Result<String, backend::Error> {
            self.next_id += 1;
            let id = self.next_id.to_string();
            self.calls.push((
                name.to_string(),
                attrs.clone(),
                queue.map(str::to_string),
                lastid.map(str::to_string),
            ));
            Ok(id)
        }
    }

    fn plan_and_schedule(source: &str, targets: &[&str]) -> (Plan, Vec<String>) {
        let recipe = parser::parse(source, Env::default()).unwrap();
        let requested: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
        let plan = resolve::build(&recipe, &requested, Path::new("/work")).unwrap();
        let order = schedule::order(&plan, &requested).unwrap();
        (plan, order)
    }

    #[test]
    fn linear_chain_threads_dependency_ids() {
        let (mut plan, order) = plan_and_schedule("A: B\n\ttrue\nB: C\n\ttrue\nC:\n\ttrue\n", &["A"]);
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        assert_eq!(recorder.calls.len(), 3);
        assert_eq!(recorder.calls[0].0, "C");
        assert_eq!(recorder.calls[1].0, "B");
        assert_eq!(recorder.calls[2].0, "A");

        let a_depend = recorder.calls[2].1.get("depend").unwrap();
        let b_id = plan.get("B").unwrap().submission_id.clone().unwrap();
        assert_eq!(a_depend, &format!("afterok:{b_id}"));
    }

    #[test]
    fn default_attributes_are_populated() {
        let (mut plan, order) = plan_and_schedule("A:\n\ttrue\n", &["A"]);
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        let attrs = &recorder.calls[0].1;
        assert_eq!(attrs.get("N").unwrap(), "A");
        assert_eq!(attrs.get("S").unwrap(), "/bin/sh");
        assert!(attrs.contains_key("v"));
    }

    #[test]
    fn queue_attribute_is_consumed_not_forwarded() {
        let (mut plan, order) = plan_and_schedule("A:\n\t@queue batch1\n\ttrue\n", &["A"]);
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        assert_eq!(recorder.calls[0].2.as_deref(), Some("batch1"));
        assert!(!recorder.calls[0].1.contains_key("queue"));
    }

    #[test]
    fn resource_list_is_split_into_sub_attributes() {
        let (mut plan, order) = plan_and_schedule("A:\n\t@l mem=4gb,walltime=01:00:00\n\ttrue\n", &["A"]);
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        let attrs = &recorder.calls[0].1;
        assert_eq!(attrs.get("l:mem").unwrap(), "4gb");
        assert_eq!(attrs.get("l:walltime").unwrap(), "01:00:00");
        assert!(!attrs.contains_key("l"));
    }

    #[test]
    fn post_schedule_sweep_submits_named_kind_variant() {
        let (mut plan, order) = plan_and_schedule(
            "job: dep\n\ttrue\njob::afternotok:\n\techo recovery\ndep:\n\ttrue\n",
            &["job"],
        );
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        assert_eq!(recorder.calls.len(), 3);
        assert_eq!(recorder.calls[2].0, "job::afternotok");
        let job_id = plan.get("job").unwrap().submission_id.clone().unwrap();
        assert_eq!(recorder.calls[2].3.as_deref(), Some(job_id.as_str()));
        let depend = recorder.calls[2].1.get("depend").unwrap();
        assert_eq!(depend, &format!("afternotok:{job_id}"));
    }

    #[test]
    fn components_are_carried_for_graph_backend_use() {
        let (mut plan, order) = plan_and_schedule("A: B\n\ttrue\nB:\n\ttrue\n", &["A"]);
        let mut recorder = Recorder::default();
        run(&mut plan, &order, &mut recorder, None).unwrap();

        let a_attrs = &recorder.calls[1].1;
        assert_eq!(a_attrs.get("__components").unwrap(), "B");
    }
}
