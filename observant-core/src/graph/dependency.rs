//! Dependency Graph
//!
//! Records which computed properties read which names, rejects registrations
//! that would close a cycle, and orders computed properties so that every
//! property comes after the ones it reads.
//!
//! # Algorithm
//!
//! Cycle detection is a depth-first walk along dependency edges starting at
//! the newly registered node; reaching that node again yields the cycle path.
//! Ordering uses Kahn's algorithm over the whole graph.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::{Node, NodeKind};

/// The computed-property dependency graph of one proxy.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// All nodes in the graph, indexed by name, in insertion order.
    nodes: IndexMap<String, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Get a reference to a node.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Register computed property `name` reading from `dependencies`.
    ///
    /// Dependencies not yet in the graph are added with the kind reported by
    /// `kind_of`. If the new edges close a cycle, nothing is changed and the
    /// cycle path is returned, starting and ending with `name`.
    pub fn add_computed<'a, I, F>(
        &mut self,
        name: &str,
        dependencies: I,
        kind_of: F,
    ) -> Result<(), Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> NodeKind,
    {
        let dependencies: Vec<&str> = dependencies.into_iter().collect();
        if let Some(cycle) = self.find_cycle(name, &dependencies) {
            return Err(cycle);
        }

        match self.nodes.get_mut(name) {
            Some(node) => node.set_kind(NodeKind::Computed),
            None => {
                self.nodes.insert(name.to_string(), Node::computed(name));
            }
        }
        for dep in dependencies {
            if !self.nodes.contains_key(dep) {
                self.nodes.insert(dep.to_string(), Node::new(dep, kind_of(dep)));
            }
            self.add_edge(dep, name);
        }
        Ok(())
    }

    /// The cycle that registering `name` with `dependencies` would close,
    /// starting and ending with `name`. The graph is not changed.
    pub fn find_cycle(&self, name: &str, dependencies: &[&str]) -> Option<Vec<String>> {
        if dependencies.contains(&name) {
            return Some(vec![name.to_string(), name.to_string()]);
        }
        // A cycle through `name` exists iff `name` is reachable from one of
        // its new dependencies by following existing dependency edges.
        dependencies.iter().find_map(|dep| {
            self.path_between(dep, name).map(|mut path| {
                path.insert(0, name.to_string());
                path
            })
        })
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    ///
    /// Both nodes must already exist; missing nodes are ignored.
    pub fn add_edge(&mut self, dependency: &str, dependent: &str) {
        if let Some(dep_node) = self.nodes.get_mut(dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(dependent) {
            dependent_node.add_dependency(dependency);
        }
    }

    /// Depth-first search from `from` along dependency edges looking for
    /// `to`. Returns the visited path, `from` first and `to` last.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.walk(from, to, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn walk<'g>(
        &'g self,
        current: &'g str,
        target: &str,
        visited: &mut HashSet<&'g str>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(current.to_string());
        if current == target {
            return true;
        }
        if visited.insert(current) {
            if let Some(node) = self.nodes.get(current) {
                for dep in node.dependencies() {
                    if self.walk(dep, target, visited, path) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    /// Computed nodes ordered so that dependencies come before dependents.
    ///
    /// Ties keep registration order.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        for (name, node) in &self.nodes {
            let degree = node.dependencies().len();
            in_degree.insert(name.as_str(), degree);
            if degree == 0 {
                queue.push_back(name.as_str());
            }
        }

        // Kahn's algorithm
        while let Some(name) = queue.pop_front() {
            if let Some(node) = self.nodes.get(name) {
                if node.kind() == NodeKind::Computed {
                    result.push(name.to_string());
                }
                for dependent in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent.as_str());
                        }
                    }
                }
            }
        }

        result
    }
}
