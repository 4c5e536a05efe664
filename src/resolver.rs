//! Dependency resolver
//!
//! Derives the deployment order from the graph's merged edge set with Kahn's
//! algorithm. Ties between unconstrained resources break on the identity key
//! (kind rank, then name), so the order is reproducible run to run. A stalled
//! sort means a cycle; the full cycle path is recovered from the residual
//! graph and reported, not just one offending edge.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::graph::Graph;
use crate::models::ResourceId;

/// The dependency graph has no topological order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", path_to_string(.path))]
pub struct CycleError {
    /// Closed walk through the cycle: each resource depends on the next,
    /// and the first resource is repeated at the end.
    pub path: Vec<ResourceId>,
}

fn path_to_string(path: &[ResourceId]) -> String {
    path.iter()
        .map(ResourceId::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Compute a total deployment order consistent with every edge.
///
/// Every resource in the graph appears exactly once in the result; for each
/// `(prerequisite, dependent)` edge the prerequisite comes first.
pub fn deploy_order(graph: &Graph) -> Result<Vec<ResourceId>, CycleError> {
    let edges = graph.ordering_edges();

    let mut dependents: BTreeMap<&ResourceId, Vec<&ResourceId>> = BTreeMap::new();
    let mut indegree: BTreeMap<&ResourceId, usize> = graph.ids().map(|id| (id, 0)).collect();

    for (prerequisite, dependent) in &edges {
        dependents.entry(prerequisite).or_default().push(dependent);
        *indegree
            .get_mut(dependent)
            .expect("edge endpoints are graph resources") += 1;
    }

    let mut ready: BTreeSet<&ResourceId> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order: Vec<ResourceId> = Vec::with_capacity(graph.len());
    while let Some(next) = ready.pop_first() {
        order.push(next.clone());
        if let Some(list) = dependents.get(next) {
            for dependent in list {
                let degree = indegree
                    .get_mut(dependent)
                    .expect("edge endpoints are graph resources");
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() == graph.len() {
        tracing::debug!(resources = order.len(), edges = edges.len(), "deploy order resolved");
        return Ok(order);
    }

    Err(recover_cycle(&edges, &indegree))
}

/// Walk the residual graph to a closed dependency walk.
///
/// Every residual node still has an unprocessed prerequisite, so following
/// prerequisites from any residual node must revisit a node.
fn recover_cycle(
    edges: &[(ResourceId, ResourceId)],
    indegree: &BTreeMap<&ResourceId, usize>,
) -> CycleError {
    let residual: BTreeSet<&ResourceId> = indegree
        .iter()
        .filter(|(_, degree)| **degree > 0)
        .map(|(id, _)| *id)
        .collect();

    let mut prerequisites: BTreeMap<&ResourceId, Vec<&ResourceId>> = BTreeMap::new();
    for (prerequisite, dependent) in edges {
        if residual.contains(prerequisite) && residual.contains(dependent) {
            prerequisites.entry(dependent).or_default().push(prerequisite);
        }
    }

    let start = residual
        .iter()
        .next()
        .copied()
        .expect("stalled sort leaves residual nodes");

    let mut seen: Vec<&ResourceId> = vec![start];
    loop {
        let current = *seen.last().expect("walk is non-empty");
        let next = prerequisites
            .get(current)
            .and_then(|list| list.first())
            .copied()
            .expect("residual nodes keep a residual prerequisite");

        if let Some(position) = seen.iter().position(|id| *id == next) {
            // seen[position..] walks dependents toward prerequisites; flip it
            // so the path reads "each depends on the next".
            let mut path: Vec<ResourceId> = seen[position..].iter().map(|id| (*id).clone()).collect();
            path.push(next.clone());
            return CycleError { path };
        }
        seen.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Application, GraphBuilder, Secret, StatefulApplication};
    use crate::context::CompileContext;
    use crate::models::Kind;

    fn snapshot(builder: GraphBuilder) -> Graph {
        builder.snapshot(&CompileContext::default()).unwrap()
    }

    #[test]
    fn order_respects_depends_on() {
        let graph = snapshot(
            GraphBuilder::new()
                .with(StatefulApplication::named("db").image("postgres:16").storage(10))
                .with(Application::named("api").image("api:1").depends_on("db")),
        );

        let order = deploy_order(&graph).unwrap();
        let names: Vec<&str> = order.iter().map(|id| id.name.as_str()).collect();
        assert_eq!(names, vec!["db", "api"]);
    }

    #[test]
    fn unconstrained_ties_break_on_kind_then_name() {
        let graph = snapshot(
            GraphBuilder::new()
                .with(Application::named("zeta").image("z:1"))
                .with(Application::named("alpha").image("a:1"))
                .with(Secret::named("token").key("value")),
        );

        let order = deploy_order(&graph).unwrap();
        let names: Vec<&str> = order.iter().map(|id| id.name.as_str()).collect();
        // Secrets rank before applications; applications sort by name.
        assert_eq!(names, vec!["token", "alpha", "zeta"]);
    }

    #[test]
    fn two_node_cycle_reports_both_participants() {
        let graph = snapshot(
            GraphBuilder::new()
                .with(Application::named("a").image("a:1").depends_on("b"))
                .with(Application::named("b").image("b:1").depends_on("a")),
        );

        let err = deploy_order(&graph).unwrap_err();
        let names: Vec<&str> = err.path.iter().map(|id| id.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
        // Closed walk: first repeated at the end.
        assert_eq!(err.path.first(), err.path.last());
        assert_eq!(err.path.len(), 3);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = snapshot(
            GraphBuilder::new().with(Application::named("a").image("a:1").depends_on("a")),
        );

        let err = deploy_order(&graph).unwrap_err();
        assert_eq!(err.path.len(), 2);
        assert_eq!(err.path[0].name, "a");
    }

    #[test]
    fn cycle_display_names_the_path() {
        let err = CycleError {
            path: vec![
                crate::models::ResourceId::new(Kind::Application, "default", "a"),
                crate::models::ResourceId::new(Kind::Application, "default", "b"),
                crate::models::ResourceId::new(Kind::Application, "default", "a"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle: default/application/a -> default/application/b -> default/application/a"
        );
    }

    #[test]
    fn order_is_stable_across_runs() {
        let builder = GraphBuilder::new()
            .with(Application::named("c").image("c:1"))
            .with(Application::named("b").image("b:1"))
            .with(Application::named("a").image("a:1").depends_on("c"));

        let first = deploy_order(&snapshot(builder.clone())).unwrap();
        let second = deploy_order(&snapshot(builder)).unwrap();
        assert_eq!(first, second);
    }
}
