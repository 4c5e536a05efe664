//! Compilation entry point
//!
//! Wires the pipeline together: resolve the deploy order, validate, then run
//! the requested generators. The caller always receives one structured
//! result carrying every diagnostic and every artifact that was produced;
//! partial success is explicit, never silent.

use crate::context::CompileContext;
use crate::generate::{Artifact, GeneratorRegistry};
use crate::graph::Graph;
use crate::models::ResourceId;
use crate::resolver::deploy_order;
use crate::target::Target;
use crate::validate::{run_all, Diagnostic, Severity};

/// The structured outcome of one compilation run
#[derive(Debug, Clone, Default)]
pub struct CompilationResult {
    /// Every validation and generation finding, in pipeline order
    pub diagnostics: Vec<Diagnostic>,
    /// Resolved deployment order (empty when ordering failed)
    pub order: Vec<ResourceId>,
    /// Artifacts from every target that rendered successfully
    pub artifacts: Vec<Artifact>,
}

impl CompilationResult {
    /// True when no error-severity diagnostic was produced
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Artifacts belonging to one target
    pub fn artifacts_for(&self, target: Target) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.target() == target)
    }
}

/// Compile a graph for the requested targets with the built-in generators.
///
/// An empty target set means every target.
pub fn compile(graph: &Graph, context: &CompileContext, targets: &[Target]) -> CompilationResult {
    compile_with(&GeneratorRegistry::builtin(), graph, context, targets)
}

/// Compile with an explicit generator registry.
///
/// Ordering and validation errors abort before any generator runs. A
/// generator failure is recorded as an error diagnostic for its target while
/// the remaining targets still render.
pub fn compile_with(
    registry: &GeneratorRegistry,
    graph: &Graph,
    context: &CompileContext,
    targets: &[Target],
) -> CompilationResult {
    let order = match deploy_order(graph) {
        Ok(order) => order,
        Err(cycle) => {
            tracing::debug!(%cycle, "compilation aborted on dependency cycle");
            return CompilationResult {
                diagnostics: vec![Diagnostic::graph_error("cycle/detected", cycle.to_string())],
                ..CompilationResult::default()
            };
        }
    };

    let diagnostics = run_all(graph, &order, context);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return CompilationResult {
            diagnostics,
            order,
            artifacts: Vec::new(),
        };
    }

    let mut result = CompilationResult {
        diagnostics,
        order,
        artifacts: Vec::new(),
    };

    for target in Target::expand_all(targets) {
        let Some(generator) = registry.get(target) else {
            result.diagnostics.push(Diagnostic::graph_error(
                "generate/unknown-target",
                format!("no generator registered for target '{target}'"),
            ));
            continue;
        };
        match generator.generate(graph, &result.order, context) {
            Ok(artifacts) => {
                tracing::debug!(%target, artifacts = artifacts.len(), "target rendered");
                result.artifacts.extend(artifacts);
            }
            Err(error) => {
                tracing::debug!(%target, %error, "target failed to render");
                result.diagnostics.push(Diagnostic::graph_error(
                    "generate/failed",
                    format!("{target}: {error}"),
                ));
            }
        }
    }

    tracing::info!(
        resources = graph.len(),
        artifacts = result.artifacts.len(),
        errors = result.errors().count(),
        "compilation finished"
    );
    result
}

/// Resolve and validate without generating anything (check mode)
pub fn validate_only(graph: &Graph, context: &CompileContext) -> CompilationResult {
    let order = match deploy_order(graph) {
        Ok(order) => order,
        Err(cycle) => {
            return CompilationResult {
                diagnostics: vec![Diagnostic::graph_error("cycle/detected", cycle.to_string())],
                ..CompilationResult::default()
            };
        }
    };
    let diagnostics = run_all(graph, &order, context);
    CompilationResult {
        diagnostics,
        order,
        artifacts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Application, GraphBuilder, StatefulApplication};

    #[test]
    fn cycle_aborts_with_no_artifacts() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(Application::named("a").image("a:1").depends_on("b"))
            .with(Application::named("b").image("b:1").depends_on("a"))
            .snapshot(&context)
            .unwrap();

        let result = compile(&graph, &context, &[]);
        assert!(!result.succeeded());
        assert!(result.artifacts.is_empty());
        let cycle = result.errors().next().unwrap();
        assert_eq!(cycle.code, "cycle/detected");
        assert!(cycle.message.contains("a"));
        assert!(cycle.message.contains("b"));
    }

    #[test]
    fn dangling_reference_aborts_before_generation() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(Application::named("x").image("x:1").env_from_secret("missing"))
            .snapshot(&context)
            .unwrap();

        let result = compile(&graph, &context, &[Target::Manifest]);
        assert!(!result.succeeded());
        assert!(result.artifacts.is_empty());
        assert_eq!(
            result
                .errors()
                .filter(|d| d.code == "reference/dangling")
                .count(),
            1
        );
    }

    #[test]
    fn warnings_ride_along_with_artifacts() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(Application::named("agent").image("img:1").privileged())
            .snapshot(&context)
            .unwrap();

        let result = compile(&graph, &context, &[Target::Manifest]);
        assert!(result.succeeded());
        assert!(!result.artifacts.is_empty());
        assert_eq!(result.warnings().count(), 1);
    }

    #[test]
    fn generator_failure_is_isolated_per_target() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(Application::named("api").image("api:1"))
            .with(crate::builder::AccessRole::named("reader").grant(["get"], ["secrets"]))
            .snapshot(&context)
            .unwrap();

        let result = compile(&graph, &context, &[Target::Manifest, Target::Compose]);
        // Compose cannot express access control; manifest still renders.
        assert!(!result.succeeded());
        assert!(result.artifacts_for(Target::Manifest).count() > 0);
        assert_eq!(result.artifacts_for(Target::Compose).count(), 0);
        assert!(result
            .errors()
            .any(|d| d.code == "generate/failed" && d.message.starts_with("compose")));
    }

    #[test]
    fn validate_only_produces_no_artifacts() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(StatefulApplication::named("db").image("postgres:16").storage(10))
            .snapshot(&context)
            .unwrap();

        let result = validate_only(&graph, &context);
        assert!(result.succeeded());
        assert!(result.artifacts.is_empty());
        assert_eq!(result.order.len(), 1);
    }
}
