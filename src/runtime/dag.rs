// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Step dependency graph
//!
//! Builds the dependency graph of a compiled spec, validates it, and
//! runs it: a vertex is started as soon as every vertex it depends on
//! has returned, whatever the outcome. Independent vertices run
//! concurrently.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::debug;

use crate::engine::Spec;
use crate::errors::{ErrorList, RunnerError, RunnerResult};

/// Dependency graph keyed by step name
#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl Dag {
    /// Build the graph from vertex names and their dependencies, in
    /// declaration order.
    pub fn build<'a, I>(vertices: I) -> RunnerResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let vertices: Vec<_> = vertices.into_iter().collect();
        let mut dag = Self::default();

        for (name, _) in &vertices {
            if dag.name_to_index.contains_key(*name) {
                return Err(RunnerError::DuplicateStep {
                    step: name.to_string(),
                });
            }
            let node = dag.graph.add_node(name.to_string());
            dag.name_to_index.insert(name.to_string(), node);
        }

        for (name, deps) in &vertices {
            let node = dag.name_to_index[*name];
            for dep in deps.iter() {
                let dep_node =
                    dag.name_to_index
                        .get(dep)
                        .ok_or_else(|| RunnerError::UnknownDependency {
                            step: name.to_string(),
                            dependency: dep.clone(),
                        })?;
                if !dag.graph.contains_edge(*dep_node, node) {
                    dag.graph.add_edge(*dep_node, node, ());
                }
            }
        }

        dag.validate_acyclic()?;
        Ok(dag)
    }

    /// Graph of the steps of a compiled spec
    pub fn from_spec(spec: &Spec) -> RunnerResult<Self> {
        Self::build(
            spec.steps
                .iter()
                .map(|s| (s.name.as_str(), s.depends_on.as_slice())),
        )
    }

    fn validate_acyclic(&self) -> RunnerResult<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(RunnerError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            }),
        }
    }

    /// Names along the first cycle reachable from `start`
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let mut path = Vec::new();
        let mut members = Vec::new();
        depth_first_search(&self.graph, Some(start), |event| match event {
            DfsEvent::Discover(node, _) => {
                path.push(node);
                Control::Continue
            }
            DfsEvent::Finish(_, _) => {
                path.pop();
                Control::Continue
            }
            DfsEvent::BackEdge(_, target) => {
                if let Some(pos) = path.iter().position(|n| *n == target) {
                    members = path[pos..].to_vec();
                }
                Control::Break(())
            }
            _ => Control::Continue,
        });

        let mut names: Vec<String> = members.iter().map(|n| self.graph[*n].clone()).collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Vertex names in an order that respects every edge
    pub fn topological_order(&self) -> Vec<String> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n].clone()).collect())
            .unwrap_or_default()
    }

    /// Direct dependencies of a vertex, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        let Some(node) = self.name_to_index.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .collect();
        deps.sort();
        deps.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .collect();
        edges.sort();
        edges
            .into_iter()
            .map(|(from, to)| (self.graph[from].as_str(), self.graph[to].as_str()))
            .collect()
    }

    /// Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for node in self.graph.node_indices() {
            out.push_str(&format!("    n{}[\"{}\"]\n", node.index(), self.graph[node]));
        }
        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!("    n{} --> n{}\n", from.index(), to.index()));
            }
        }
        out
    }

    /// Graphviz DOT
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.edges() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", self.graph[node]));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Numbered execution order with dependencies
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.topological_order().iter().enumerate() {
            out.push_str(&format!("{}. {}", i + 1, name));
            let deps = self.dependencies(name);
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }
        out
    }

    /// Run every vertex once, each only after all of its dependencies
    /// have returned. Vertex errors are collected; a panicking vertex
    /// is reported as a graph error and still releases its dependents.
    pub async fn run<F, Fut>(&self, visit: F) -> RunnerResult<()>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = RunnerResult<()>> + Send + 'static,
    {
        let mut waiting: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| {
                let deps = self
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count();
                (n, deps)
            })
            .collect();

        let mut tasks = JoinSet::new();
        let spawn = |tasks: &mut JoinSet<(NodeIndex, RunnerResult<()>)>, node: NodeIndex| {
            let name = self.graph[node].clone();
            debug!(vertex = %name, "vertex scheduled");
            let vertex = tokio::spawn(visit(name.clone()));
            tasks.spawn(async move {
                let result = match vertex.await {
                    Ok(result) => result,
                    Err(e) => Err(RunnerError::Graph {
                        vertex: name,
                        message: e.to_string(),
                    }),
                };
                (node, result)
            });
        };

        let mut roots: Vec<NodeIndex> = waiting
            .iter()
            .filter(|(_, deps)| **deps == 0)
            .map(|(n, _)| *n)
            .collect();
        roots.sort();
        for node in roots {
            spawn(&mut tasks, node);
        }

        let mut errors = ErrorList::new();
        let mut done: HashSet<NodeIndex> = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let (node, result) = match joined {
                Ok(completed) => completed,
                Err(e) => {
                    errors.push(RunnerError::Graph {
                        vertex: String::new(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            errors.absorb(result);
            done.insert(node);

            let mut ready: Vec<NodeIndex> = Vec::new();
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(deps) = waiting.get_mut(&next) {
                    *deps = deps.saturating_sub(1);
                    if *deps == 0 {
                        ready.push(next);
                    }
                }
            }
            ready.sort();
            for next in ready {
                spawn(&mut tasks, next);
            }
        }

        if done.len() != self.graph.node_count() {
            errors.push(RunnerError::Graph {
                vertex: String::new(),
                message: format!(
                    "{} of {} vertices never ran",
                    self.graph.node_count() - done.len(),
                    self.graph.node_count()
                ),
            });
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn dag(vertices: &[(&str, &[&str])]) -> RunnerResult<Dag> {
        let owned: Vec<(String, Vec<String>)> = vertices
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect();
        Dag::build(owned.iter().map(|(n, d)| (n.as_str(), d.as_slice())))
    }

    #[test]
    fn test_unknown_dependency() {
        let err = dag(&[("a", &[]), ("b", &["missing"])]).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::UnknownDependency { ref step, ref dependency }
                if step == "b" && dependency == "missing"
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = dag(&[("x", &["y"]), ("y", &[]), ("x", &[])]).unwrap_err();
        assert!(matches!(err, RunnerError::DuplicateStep { ref step } if step == "x"));
    }

    #[test]
    fn test_cycle_detected() {
        let err = dag(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]).unwrap_err();
        match err {
            RunnerError::CircularDependency { steps } => {
                assert_eq!(steps.len(), 4);
                assert_eq!(steps.first(), steps.last());
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_text_and_dot_output() {
        let dag = dag(&[("clone", &[]), ("a", &["clone"]), ("b", &["clone"]), ("c", &["a", "b"])])
            .unwrap();
        let text = dag.to_text();
        assert!(text.starts_with("1. clone\n"));
        assert!(text.contains("c [depends: a, b]"));

        let dot = dag.to_dot();
        assert!(dot.contains("\"clone\" -> \"a\";"));
        assert!(dot.contains("\"b\" -> \"c\";"));

        let mermaid = dag.to_mermaid();
        assert!(mermaid.contains("n0[\"clone\"]"));
        assert!(mermaid.contains("n0 --> n1"));
    }

    #[tokio::test]
    async fn test_run_respects_dependencies() {
        let dag = dag(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = order.clone();
        dag.run(move |name| {
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                log.lock().unwrap().push(name);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_independent_branches_run_concurrently() {
        let dag = dag(&[("root", &[]), ("left", &["root"]), ("right", &["root"]), ("join", &["left", "right"])])
            .unwrap();
        let running = Arc::new(Mutex::new(0usize));
        let peak = Arc::new(Mutex::new(0usize));
        let order = Arc::new(Mutex::new(Vec::new()));

        let (r, p, o) = (running.clone(), peak.clone(), order.clone());
        dag.run(move |name| {
            let (running, peak, order) = (r.clone(), p.clone(), o.clone());
            async move {
                {
                    let mut n = running.lock().unwrap();
                    *n += 1;
                    let mut max = peak.lock().unwrap();
                    *max = (*max).max(*n);
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                *running.lock().unwrap() -= 1;
                order.lock().unwrap().push(name);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*peak.lock().unwrap(), 2);
        let order = order.lock().unwrap();
        assert_eq!(order.first().map(String::as_str), Some("root"));
        assert_eq!(order.last().map(String::as_str), Some("join"));
    }

    #[tokio::test]
    async fn test_errors_are_collected_and_dependents_still_run() {
        let dag = dag(&[("a", &[]), ("b", &["a"]), ("c", &[])]).unwrap();
        let visited = Arc::new(Mutex::new(Vec::new()));

        let v = visited.clone();
        let result = dag
            .run(move |name| {
                let visited = v.clone();
                async move {
                    visited.lock().unwrap().push(name.clone());
                    match name.as_str() {
                        "a" => Err(RunnerError::report("a broke")),
                        "c" => panic!("c exploded"),
                        _ => Ok(()),
                    }
                }
            })
            .await;

        let mut visited = visited.lock().unwrap().clone();
        visited.sort();
        assert_eq!(visited, vec!["a", "b", "c"]);
        match result {
            Err(RunnerError::Multiple { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, RunnerError::Graph { vertex, .. } if vertex == "c")));
            }
            other => panic!("expected two errors, got {:?}", other),
        }
    }
}
