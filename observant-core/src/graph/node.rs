//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use indexmap::IndexSet;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A model field. Fields are the roots of the graph: they have no
    /// dependencies, only dependents.
    Field,

    /// A computed property. Computed nodes have dependencies and may have
    /// dependents.
    Computed,

    /// A name declared as a dependency that is neither a known field nor a
    /// registered computed property (yet). It still takes part in cycle
    /// detection and becomes `Computed` if registered later.
    Unresolved,
}

/// A node in the dependency graph, identified by its name.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    kind: NodeKind,

    /// Names this node reads from.
    dependencies: IndexSet<String>,

    /// Names that read from this node.
    dependents: IndexSet<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new computed node.
    pub fn computed(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Computed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    /// Add a dependency (a node that this node reads from).
    pub fn add_dependency(&mut self, name: &str) {
        self.dependencies.insert(name.to_string());
    }

    /// Dependencies in declaration order.
    pub fn dependencies(&self) -> &IndexSet<String> {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, name: &str) {
        self.dependents.insert(name.to_string());
    }

    pub fn dependents(&self) -> &IndexSet<String> {
        &self.dependents
    }
}
