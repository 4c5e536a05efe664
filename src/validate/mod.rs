//! Validation engine
//!
//! Four independent passes over the immutable graph, each producing zero or
//! more severity-tagged diagnostics. Passes never mutate the graph and are
//! order-insensitive; `run_all` concatenates them in a fixed order so the
//! diagnostic list itself is deterministic. Any `error` severity aborts the
//! pipeline before generation.

mod bounds;
mod reference;
mod schema;
mod security;

pub use bounds::bounds_pass;
pub use reference::reference_pass;
pub use schema::schema_pass;
pub use security::security_pass;

use crate::context::CompileContext;
use crate::graph::Graph;
use crate::models::{Resource, ResourceId};

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A structured validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `reference/dangling`
    pub code: &'static str,
    /// The resource the finding is about, when there is one
    pub resource: Option<ResourceId>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: &'static str, resource: &Resource, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            resource: Some(resource.id().clone()),
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, resource: &Resource, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            resource: Some(resource.id().clone()),
            message: message.into(),
        }
    }

    /// An error not tied to one resource
    pub fn graph_error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            resource: None,
            message: message.into(),
        }
    }

    /// A warning not tied to one resource
    pub fn graph_warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            resource: None,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource {
            Some(id) => write!(f, "{} [{}] {}: {}", self.severity, self.code, id, self.message),
            None => write!(f, "{} [{}] {}", self.severity, self.code, self.message),
        }
    }
}

/// Run every validation pass over the graph.
///
/// `order` is the resolved deployment order; passes take the graph and
/// context only, since none of the current checks depend on positions.
pub fn run_all(graph: &Graph, order: &[ResourceId], context: &CompileContext) -> Vec<Diagnostic> {
    let mut diagnostics = schema_pass(graph, context);
    diagnostics.extend(reference_pass(graph, context));
    diagnostics.extend(security_pass(graph, context));
    diagnostics.extend(bounds_pass(graph, context));

    tracing::debug!(
        resources = order.len(),
        errors = diagnostics.iter().filter(|d| d.is_error()).count(),
        warnings = diagnostics.iter().filter(|d| !d.is_error()).count(),
        "validation finished"
    );
    diagnostics
}
