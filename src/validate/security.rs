//! Security pass: heuristic checks on secret handling, privilege, and
//! public exposure
//!
//! Findings are warnings under the default balanced mode and escalate to
//! errors under strict mode. The pass never blocks on its own in balanced
//! mode, matching the non-fatal contract for security diagnostics.

use crate::context::{CompileContext, SecurityMode};
use crate::graph::Graph;
use crate::models::{ContainerSpec, Kind, Resource, ResourceSpec};

use super::{Diagnostic, Severity};

/// Heuristic security checks over the whole graph
pub fn security_pass(graph: &Graph, context: &CompileContext) -> Vec<Diagnostic> {
    let severity = match context.security_mode {
        SecurityMode::Balanced => Severity::Warning,
        SecurityMode::Strict => Severity::Error,
    };
    let finding = |code, resource: &Resource, message: String| Diagnostic {
        severity,
        code,
        resource: Some(resource.id().clone()),
        message,
    };

    let mut diagnostics = Vec::new();

    for resource in graph.resources() {
        if let Some(container) = container_of(resource) {
            check_secret_as_config(graph, resource, container, &mut diagnostics, &finding);

            if container.privileged && !context.is_privilege_allowed(resource.name()) {
                diagnostics.push(finding(
                    "security/privileged",
                    resource,
                    "container runs privileged without an explicit allowance".to_string(),
                ));
            }
            if container.run_as_root && !context.is_privilege_allowed(resource.name()) {
                diagnostics.push(finding(
                    "security/run-as-root",
                    resource,
                    "container runs as root without an explicit allowance".to_string(),
                ));
            }
        }

        if let ResourceSpec::ExternalRoute(spec) = resource.spec() {
            if spec.public && spec.tls.is_none() {
                diagnostics.push(finding(
                    "security/public-no-tls",
                    resource,
                    format!("route '{}' is public without a TLS declaration", spec.host),
                ));
            }
        }
    }

    diagnostics
}

fn container_of(resource: &Resource) -> Option<&ContainerSpec> {
    match resource.spec() {
        ResourceSpec::Application(spec) => Some(&spec.container),
        ResourceSpec::StatefulApplication(spec) => Some(&spec.workload.container),
        ResourceSpec::BatchJob(spec) => Some(&spec.container),
        ResourceSpec::ScheduledJob(spec) => Some(&spec.job.container),
        _ => None,
    }
}

/// A secret pulled in through a config role would surface its values as
/// plain configuration.
fn check_secret_as_config(
    graph: &Graph,
    resource: &Resource,
    container: &ContainerSpec,
    diagnostics: &mut Vec<Diagnostic>,
    finding: &impl Fn(&'static str, &Resource, String) -> Diagnostic,
) {
    let names = container
        .config_mounts
        .iter()
        .map(|m| m.source.as_str())
        .chain(container.env_from_configs.iter().map(String::as_str));

    for name in names {
        let is_secret = graph
            .lookup_named(resource.namespace(), name)
            .iter()
            .any(|r| r.kind() == Kind::Secret);
        if is_secret {
            diagnostics.push(finding(
                "security/secret-as-config",
                resource,
                format!("'{name}' is a secret but is consumed as plain configuration"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Application, ExternalRoute, GraphBuilder, NetworkService, Secret};
    use crate::context::CompileContext;

    fn diagnostics_for(builder: GraphBuilder, context: &CompileContext) -> Vec<Diagnostic> {
        let graph = builder.snapshot(context).unwrap();
        security_pass(&graph, context)
    }

    #[test]
    fn secret_consumed_as_config_is_flagged() {
        let context = CompileContext::default();
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Secret::named("token").key("value"))
                .with(Application::named("api").image("img").env_from_config("token")),
            &context,
        );
        assert!(diagnostics.iter().any(|d| d.code == "security/secret-as-config"));
    }

    #[test]
    fn privileged_without_allowance_warns() {
        let context = CompileContext::default();
        let diagnostics = diagnostics_for(
            GraphBuilder::new().with(Application::named("agent").image("img").privileged()),
            &context,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "security/privileged");
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn allow_list_silences_privilege_findings() {
        let context = CompileContext::default().allow_privileged("agent");
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Application::named("agent").image("img").privileged().run_as_root()),
            &context,
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn public_route_without_tls_warns() {
        let context = CompileContext::default();
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(NetworkService::named("svc").backend("api"))
                .with(
                    ExternalRoute::named("edge")
                        .host("api.example.com")
                        .backend("svc")
                        .public(),
                ),
            &context,
        );
        assert!(diagnostics.iter().any(|d| d.code == "security/public-no-tls"));
    }

    #[test]
    fn tls_silences_public_route_finding() {
        let context = CompileContext::default();
        let diagnostics = diagnostics_for(
            GraphBuilder::new()
                .with(Secret::named("edge-cert").key("tls-crt"))
                .with(NetworkService::named("svc").backend("api"))
                .with(
                    ExternalRoute::named("edge")
                        .host("api.example.com")
                        .backend("svc")
                        .tls("edge-cert")
                        .public(),
                ),
            &context,
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn strict_mode_escalates_to_errors() {
        let context = CompileContext::default().with_security_mode(SecurityMode::Strict);
        let diagnostics = diagnostics_for(
            GraphBuilder::new().with(Application::named("agent").image("img").run_as_root()),
            &context,
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
    }
}
