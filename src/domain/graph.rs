//! Dependency graph for issues
//!
//! Issues reference their prerequisites by title. Edges point from the
//! prerequisite to the dependent, so a topological order creates every
//! prerequisite before anything that links to it. Uses petgraph for graph
//! operations.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::spec::IssueSpec;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency cycle detected between issues: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Issue {dependent:?} depends on unknown issue {prerequisite:?}")]
    UnknownIssue {
        prerequisite: String,
        dependent: String,
    },
}

/// Ordered pair: `prerequisite` must exist before `dependent`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub prerequisite: String,
    pub dependent: String,
}

impl DependencyEdge {
    pub fn new(prerequisite: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            prerequisite: prerequisite.into(),
            dependent: dependent.into(),
        }
    }
}

/// Emits one edge per declared dependency, in document order
///
/// Titles are not checked here; an edge to a missing issue is reported when
/// the graph is built.
pub fn dependency_edges<'a>(issues: impl IntoIterator<Item = &'a IssueSpec>) -> Vec<DependencyEdge> {
    issues
        .into_iter()
        .flat_map(|issue| {
            issue
                .deps
                .iter()
                .map(move |dep| DependencyEdge::new(dep.clone(), issue.title.clone()))
        })
        .collect()
}

/// A dependency graph keyed by issue title
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<String, ()>,

    /// Map from title to node index
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph from issue specs
    ///
    /// Every issue becomes a node, including issues no edge touches.
    pub fn from_issues(issues: &[IssueSpec]) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for issue in issues {
            graph.add_issue(&issue.title);
        }

        for edge in dependency_edges(issues) {
            graph.add_edge(&edge)?;
        }

        Ok(graph)
    }

    /// Adds an issue node (no-op if already present)
    pub fn add_issue(&mut self, title: &str) {
        if !self.node_map.contains_key(title) {
            let idx = self.graph.add_node(title.to_string());
            self.node_map.insert(title.to_string(), idx);
        }
    }

    /// Adds a dependency edge between two known issues
    ///
    /// Cycles are accepted here and reported by [`topological_order`].
    ///
    /// [`topological_order`]: DependencyGraph::topological_order
    pub fn add_edge(&mut self, edge: &DependencyEdge) -> Result<(), GraphError> {
        let unknown = || GraphError::UnknownIssue {
            prerequisite: edge.prerequisite.clone(),
            dependent: edge.dependent.clone(),
        };

        let from = *self.node_map.get(&edge.prerequisite).ok_or_else(unknown)?;
        let to = *self.node_map.get(&edge.dependent).ok_or_else(unknown)?;

        self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Returns all titles in creation order (prerequisites before dependents)
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(_) => Err(GraphError::CycleDetected(self.cycle_members())),
        }
    }

    /// Titles that sit on at least one cycle, sorted
    fn cycle_members(&self) -> Vec<String> {
        let mut members: Vec<String> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => self.graph.find_edge(*single, *single).is_some(),
                _ => true,
            })
            .flatten()
            .filter_map(|idx| self.graph.node_weight(idx).cloned())
            .collect();

        members.sort();
        members
    }
}

/// Builds the graph for a batch and returns its creation order
pub fn schedule(issues: &[IssueSpec]) -> Result<Vec<String>, GraphError> {
    DependencyGraph::from_issues(issues)?.topological_order()
}
