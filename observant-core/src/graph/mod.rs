//! Dependency Graph
//!
//! This module implements the graph that tracks which computed properties
//! read which fields and which other computed properties.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are names: model fields, computed properties, or declared names
//!   that do not resolve to either
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! The graph does not drive recomputation itself; proxies wire listeners for
//! that. It exists to refuse cyclic registrations up front and to report
//! evaluation order.
//!
//! We maintain both forward (dependencies) and reverse (dependents) edges
//! to enable traversal in both directions.

mod dependency;
mod node;

pub use dependency::DependencyGraph;
pub use node::{Node, NodeKind};
