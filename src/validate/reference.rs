//! Reference pass: every by-name relation resolves to a role-compatible
//! resource

use crate::context::CompileContext;
use crate::graph::Graph;
use crate::models::ResourceSpec;

use super::Diagnostic;

/// Check reference existence and role compatibility, including relations
/// that do not participate in ordering (label selectors).
pub fn reference_pass(graph: &Graph, _context: &CompileContext) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for resource in graph.resources() {
        for reference in resource.references() {
            if !graph.resolve(resource.namespace(), &reference).is_empty() {
                continue;
            }

            let same_name = graph.lookup_named(resource.namespace(), &reference.name);
            if same_name.is_empty() {
                diagnostics.push(Diagnostic::error(
                    "reference/dangling",
                    resource,
                    format!(
                        "{} reference '{}' does not resolve to any resource",
                        reference.role, reference.name
                    ),
                ));
            } else {
                let found: Vec<&str> = same_name.iter().map(|r| r.kind().label()).collect();
                diagnostics.push(Diagnostic::error(
                    "reference/role",
                    resource,
                    format!(
                        "{} reference '{}' resolves to {} - not a kind this role accepts",
                        reference.role,
                        reference.name,
                        found.join(", ")
                    ),
                ));
            }
        }

        // Selectors do not order anything, but a selector matching zero
        // workloads is almost always a typo.
        if let ResourceSpec::NetworkService(spec) = resource.spec() {
            if !spec.selector.is_empty()
                && graph
                    .workloads_matching(resource.namespace(), &spec.selector)
                    .is_empty()
            {
                diagnostics.push(Diagnostic::warning(
                    "reference/selector",
                    resource,
                    "label selector matches no workload in this namespace",
                ));
            }
        }
    }

    tracing::debug!(
        dangling = diagnostics
            .iter()
            .filter(|d| d.code == "reference/dangling")
            .count(),
        "reference pass finished"
    );
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{
        Application, ConfigData, ExternalRoute, GraphBuilder, NetworkService, Secret,
    };
    use crate::context::CompileContext;
    use crate::models::{Kind, ReferenceRole};

    /// A kind no role can ever reach would make parts of the graph
    /// unreachable by reference; keep the capability table total.
    fn kind_is_referenceable(kind: Kind) -> bool {
        [
            ReferenceRole::MountSecret,
            ReferenceRole::MountConfig,
            ReferenceRole::EnvFromSecret,
            ReferenceRole::EnvFromConfig,
            ReferenceRole::AttachVolume,
            ReferenceRole::ConnectTo,
            ReferenceRole::RouteBackend,
            ReferenceRole::BindRole,
            ReferenceRole::DependsOn,
            ReferenceRole::GroupMember,
        ]
        .iter()
        .any(|role| role.compatible_kinds().contains(&kind))
    }

    fn diagnostics_for(builder: GraphBuilder) -> Vec<Diagnostic> {
        let context = CompileContext::default();
        let graph = builder.snapshot(&context).unwrap();
        reference_pass(&graph, &context)
    }

    #[test]
    fn dangling_secret_reference_is_one_error() {
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Application::named("x").image("img").env_from_secret("missing")),
        );
        let dangling: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.code == "reference/dangling")
            .collect();
        assert_eq!(dangling.len(), 1);
        assert!(dangling[0].message.contains("missing"));
    }

    #[test]
    fn resolved_references_produce_nothing() {
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Secret::named("token").key("value"))
                .with(Application::named("api").image("img").env_from_secret("token")),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn wrong_kind_is_a_role_error_not_dangling() {
        // A config map mounted through the secret role.
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(ConfigData::named("settings").entry("k", "v"))
                .with(Application::named("api").image("img").mount_secret("settings", "/etc/s")),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "reference/role");
        assert!(diagnostics[0].message.contains("config-data"));
    }

    #[test]
    fn cross_namespace_references_do_not_resolve() {
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Secret::named("token").namespace("other").key("value"))
                .with(Application::named("api").image("img").env_from_secret("token")),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "reference/dangling");
    }

    #[test]
    fn empty_selector_match_is_a_warning() {
        let diagnostics = diagnostics_for(
            GraphBuilder::new().with(NetworkService::named("svc").selector("app", "ghost")),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "reference/selector");
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn route_backend_must_be_a_service() {
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Application::named("api").image("img"))
                .with(ExternalRoute::named("edge").host("example.com").backend("api")),
        );
        // Routes target services, not workloads directly.
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "reference/role");
    }

    #[test]
    fn every_kind_is_referenceable_somehow() {
        for kind in Kind::ALL {
            assert!(kind_is_referenceable(kind), "{kind} missing from capability table");
        }
    }
}
