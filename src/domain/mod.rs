//! Domain models for issue batches
//!
//! Contains the batch document, dependency scheduling and resolved views,
//! without any I/O beyond loading the document.

mod graph;
mod resolved;
mod spec;

pub use graph::{dependency_edges, schedule, DependencyEdge, DependencyGraph, GraphError};
pub use resolved::{IssueNumberMap, MilestoneMap, ResolveError, ResolvedIssue};
pub use spec::{
    split_list, BatchSpec, BodyFragment, DocumentFormat, IssueBody, IssueSpec, MilestoneSpec,
    SpecError,
};
