// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Graph-dump backend: emits the resolved dependency graph as Graphviz
//! `dot` source instead of submitting anything. Reuses `crates/dag`'s `Dag`
//! purely for its insertion-ordered node/index bookkeeping (this backend
//! only ever sees a schedule already proven acyclic, so `Dag::add_edge`'s
//! silent cycle refusal never comes into play).

use std::fmt::Write as _;
use std::path::Path;

use dag::Dag;
use indexmap::IndexMap;

use super::Backend;

/// Submissions arrive in schedule (dependency-first) order: for `A: B`,
/// `B: C`, `C:` the driver calls `submit` as `C`, then `B`, then `A`. The
/// reference graph dump instead numbers and emits edges root-first
/// (`t_0=A, t_1=B, t_2=C`, edges `t_0 -> t_1` then `t_1 -> t_2`). Recording
/// `(target, component)` edges in call order and walking that list in
/// reverse at render time reproduces this without requiring the whole
/// schedule up front: the last edge recorded (the root's) is the first one
/// aliased and emitted.
#[derive(Debug, Default)]
pub struct Graph {
    all_nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the accumulated graph as `dot` source.
    pub fn render(&self) -> String {
        let mut dag = Dag::new();

        for (target, component) in self.edges.iter().rev() {
            dag.add_node_or_get_index(target.clone());
            dag.add_node_or_get_index(component.clone());
        }
        for node in &self.all_nodes {
            dag.add_node_or_get_index(node.clone());
        }

        let mut out = String::new();
        out.push_str("digraph pbsmakefile {\n");

        for (target, component) in self.edges.iter().rev() {
            let t = dag.get_index(target).expect("recorded above").index();
            let c = dag.get_index(component).expect("recorded above").index();
            let _ = writeln!(out, "t_{t} -> t_{c};");
        }

        for node in dag.iter_nodes() {
            let idx = dag.get_index(node).expect("recorded above").index();
            let _ = writeln!(out, "t_{idx} [label=\"{node}\"];");
        }

        out.push('}');
        out.push('\n');
        out
    }
}

impl Backend for Graph {
    fn submit(
        &mut self,
        name: &str,
        _task_file: &Path,
        attrs: &IndexMap<String, String>,
        _queue: Option<&str>,
        _lastid: Option<&str>,
    ) -> Result<String, super::Error> {
        if !self.all_nodes.iter().any(|node| node == name) {
            self.all_nodes.push(name.to_string());
        }

        if let Some(components) = attrs.get("__components") {
            for component in components.split(',').filter(|entry| !entry.is_empty()) {
                self.edges.push((name.to_string(), component.to_string()));
            }
        }

        Ok(String::new())
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::*;
    use crate::env::Env;
    use crate::{parser, resolve, schedule, submit};

    #[test]
    fn renders_scenario_a_dependency_chain() {
        let recipe = parser::parse("A: B\n\ttrue\nB: C\n\ttrue\nC:\n\ttrue\n", Env::default()).unwrap();
        let requested = vec!["A".to_string()];
        let mut plan = resolve::build(&recipe, &requested, Path::new("/work")).unwrap();
        let order = schedule::order(&plan, &requested).unwrap();

        let mut backend = Graph::new();
        submit::run(&mut plan, &order, &mut backend, None).unwrap();

        let expected = "digraph pbsmakefile {\n\
t_0 -> t_1;\n\
t_1 -> t_2;\n\
t_0 [label=\"A\"];\n\
t_1 [label=\"B\"];\n\
t_2 [label=\"C\"];\n\
}\n";
        assert_eq!(backend.render(), expected);
    }

    #[test]
    fn isolated_target_gets_an_alias_with_no_edges() {
        let mut backend = Graph::new();
        backend
            .submit("A", Path::new("/tmp/task"), &IndexMap::new(), None, None)
            .unwrap();
        assert_eq!(backend.render(), "digraph pbsmakefile {\nt_0 [label=\"A\"];\n}\n");
    }
}
