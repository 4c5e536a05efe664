//! Infrastructure-as-code target: per-resource JSON resource blocks
//!
//! Each resource becomes a `resource` block keyed by a manifold type and the
//! resource's identifier-safe name; relations are rendered as address
//! expressions (`manifold_secret.db_credentials`) in `depends_on` and
//! reference fields, the way an infrastructure engine wires resources
//! together. Secrets carry a sensitive marker and never a value. Resource
//! groups map to `module` blocks over their members' addresses.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::CompileContext;
use crate::error::ManifoldResult;
use crate::graph::Graph;
use crate::models::{Kind, LabelMap, Resource, ResourceId, ResourceSpec};
use crate::target::Target;

use super::{sanitize_identifier, Artifact, Generator};

/// Renders the infrastructure-as-code target
pub struct InfraGenerator;

impl Generator for InfraGenerator {
    fn target(&self) -> Target {
        Target::Infra
    }

    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        _context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>> {
        let dir = Target::Infra.directory_name();
        let mut artifacts = Vec::new();

        for id in order {
            let resource = graph.get(id).expect("order covers graph resources");
            let content = render_block(graph, resource);
            let path = format!("{dir}/{}.{}", id.file_stem(), Target::Infra.extension());
            artifacts.push(Artifact::new(Target::Infra, path, content));
        }

        Ok(artifacts)
    }
}

/// `manifold_<kind>` type name for a resource block
fn type_name(kind: Kind) -> String {
    format!("manifold_{}", sanitize_identifier(kind.label()))
}

/// Address expression other blocks use to reference this resource
fn address(id: &ResourceId) -> String {
    format!("{}.{}", type_name(id.kind), sanitize_identifier(&id.name))
}

/// Addresses of this resource's prerequisites, sorted and deduplicated
fn depends_on(graph: &Graph, id: &ResourceId) -> Vec<String> {
    let mut addresses: Vec<String> = graph
        .ordering_edges()
        .into_iter()
        .filter(|(prerequisite, dependent)| dependent == id && prerequisite != id)
        .map(|(prerequisite, _)| address(&prerequisite))
        .collect();
    addresses.sort();
    addresses.dedup();
    addresses
}

/// Address expressions for same-namespace referents of `name` among `kinds`
fn references_to(graph: &Graph, resource: &Resource, name: &str, kinds: &[Kind]) -> Vec<String> {
    graph
        .lookup_named(resource.namespace(), name)
        .into_iter()
        .filter(|r| kinds.contains(&r.kind()))
        .map(|r| address(r.id()))
        .collect()
}

fn render_block(graph: &Graph, resource: &Resource) -> String {
    let depends = depends_on(graph, resource.id());
    let common = Common {
        namespace: resource.namespace().to_string(),
        labels: resource.labels().clone(),
        depends_on: depends,
    };

    match resource.spec() {
        ResourceSpec::Application(spec) => resource_block(
            resource,
            WorkloadBody {
                common,
                image: spec.container.image.clone(),
                replicas: spec.replicas,
                env: spec.container.env.clone(),
                env_from_secrets: reference_list(graph, resource, &spec.container.env_from_secrets, &[Kind::Secret]),
                env_from_configs: reference_list(graph, resource, &spec.container.env_from_configs, &[Kind::ConfigData]),
                ports: spec.ports.iter().map(|p| p.port).collect(),
                storage_gib: None,
            },
        ),
        ResourceSpec::StatefulApplication(spec) => resource_block(
            resource,
            WorkloadBody {
                common,
                image: spec.workload.container.image.clone(),
                replicas: spec.workload.replicas,
                env: spec.workload.container.env.clone(),
                env_from_secrets: reference_list(
                    graph,
                    resource,
                    &spec.workload.container.env_from_secrets,
                    &[Kind::Secret],
                ),
                env_from_configs: reference_list(
                    graph,
                    resource,
                    &spec.workload.container.env_from_configs,
                    &[Kind::ConfigData],
                ),
                ports: spec.workload.ports.iter().map(|p| p.port).collect(),
                storage_gib: Some(spec.storage.size_gib),
            },
        ),
        ResourceSpec::BatchJob(spec) => resource_block(
            resource,
            JobBody {
                common,
                image: spec.container.image.clone(),
                completions: spec.completions,
                parallelism: spec.parallelism,
                retries: spec.retries,
                schedule: None,
            },
        ),
        ResourceSpec::ScheduledJob(spec) => resource_block(
            resource,
            JobBody {
                common,
                image: spec.job.container.image.clone(),
                completions: spec.job.completions,
                parallelism: spec.job.parallelism,
                retries: spec.job.retries,
                schedule: Some(spec.schedule.clone()),
            },
        ),
        ResourceSpec::Secret(spec) => resource_block(
            resource,
            SecretBody {
                common,
                keys: spec.keys.clone(),
                sensitive: true,
                external_source: spec.external_source.clone(),
            },
        ),
        ResourceSpec::ConfigData(spec) => resource_block(
            resource,
            ConfigBody {
                common,
                entries: spec.entries.clone(),
            },
        ),
        ResourceSpec::NetworkService(spec) => resource_block(
            resource,
            ServiceBody {
                common,
                selector: spec.selector.clone(),
                backend: spec.backend.as_ref().map(|name| {
                    single_reference(graph, resource, name)
                }),
                ports: spec.ports.iter().map(|p| p.port).collect(),
                exposure: format!("{:?}", spec.exposure),
            },
        ),
        ResourceSpec::ExternalRoute(spec) => resource_block(
            resource,
            RouteBody {
                common,
                host: spec.host.clone(),
                path_prefix: spec.path_prefix.clone(),
                service: single_reference(graph, resource, &spec.backend),
                public: spec.public,
                tls_secret: spec.tls.as_ref().map(|tls| {
                    single_reference(graph, resource, &tls.secret_name)
                }),
            },
        ),
        ResourceSpec::AccessRole(spec) => resource_block(
            resource,
            RoleBody {
                common,
                grants: spec
                    .grants
                    .iter()
                    .map(|grant| GrantBody {
                        actions: grant.actions.clone(),
                        objects: grant.objects.clone(),
                    })
                    .collect(),
            },
        ),
        ResourceSpec::AccessBinding(spec) => resource_block(
            resource,
            BindingBody {
                common,
                role: single_reference(graph, resource, &spec.role),
                subjects: spec
                    .subjects
                    .iter()
                    .map(|subject| SubjectBody {
                        kind: format!("{:?}", subject.kind).to_lowercase(),
                        name: subject.name.clone(),
                    })
                    .collect(),
            },
        ),
        ResourceSpec::Volume(spec) => resource_block(
            resource,
            VolumeBody {
                common,
                size_gib: spec.size_gib,
                class: spec.class.clone(),
                access_mode: format!("{:?}", spec.access_mode),
            },
        ),
        ResourceSpec::ResourceGroup(spec) => {
            let members = spec
                .members
                .iter()
                .flat_map(|member| {
                    graph
                        .lookup_named(resource.namespace(), member)
                        .into_iter()
                        .filter(|r| r.kind() != Kind::ResourceGroup)
                        .map(|r| address(r.id()))
                })
                .collect();
            let mut module = BTreeMap::new();
            module.insert(
                sanitize_identifier(resource.name()),
                ModuleBody { common, members },
            );
            to_json(&ModuleBlock { module })
        }
    }
}

/// First matching address, or the bare name when nothing resolves.
///
/// Validation has already failed the pipeline on dangling references; the
/// fallback only keeps rendering total.
fn single_reference(graph: &Graph, resource: &Resource, name: &str) -> String {
    references_to(graph, resource, name, &Kind::ALL)
        .into_iter()
        .next()
        .unwrap_or_else(|| name.to_string())
}

fn reference_list(
    graph: &Graph,
    resource: &Resource,
    names: &[String],
    kinds: &[Kind],
) -> Vec<String> {
    names
        .iter()
        .flat_map(|name| {
            let found = references_to(graph, resource, name, kinds);
            if found.is_empty() {
                vec![name.clone()]
            } else {
                found
            }
        })
        .collect()
}

fn resource_block<T: Serialize>(resource: &Resource, body: T) -> String {
    let mut named = BTreeMap::new();
    named.insert(sanitize_identifier(resource.name()), body);
    let mut typed = BTreeMap::new();
    typed.insert(type_name(resource.kind()), named);
    to_json(&ResourceBlock { resource: typed })
}

fn to_json<T: Serialize>(value: &T) -> String {
    let mut content = serde_json::to_string_pretty(value).expect("typed infra blocks serialize");
    content.push('\n');
    content
}

#[derive(Serialize)]
struct ResourceBlock<T: Serialize> {
    resource: BTreeMap<String, BTreeMap<String, T>>,
}

#[derive(Serialize)]
struct ModuleBlock {
    module: BTreeMap<String, ModuleBody>,
}

#[derive(Serialize)]
struct Common {
    namespace: String,
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    labels: LabelMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

#[derive(Serialize)]
struct WorkloadBody {
    #[serde(flatten)]
    common: Common,
    image: String,
    replicas: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_from_secrets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_from_configs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_gib: Option<u32>,
}

#[derive(Serialize)]
struct JobBody {
    #[serde(flatten)]
    common: Common,
    image: String,
    completions: u32,
    parallelism: u32,
    retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<String>,
}

#[derive(Serialize)]
struct SecretBody {
    #[serde(flatten)]
    common: Common,
    keys: Vec<String>,
    sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_source: Option<String>,
}

#[derive(Serialize)]
struct ConfigBody {
    #[serde(flatten)]
    common: Common,
    entries: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ServiceBody {
    #[serde(flatten)]
    common: Common,
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    selector: LabelMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<u16>,
    exposure: String,
}

#[derive(Serialize)]
struct RouteBody {
    #[serde(flatten)]
    common: Common,
    host: String,
    path_prefix: String,
    service: String,
    public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_secret: Option<String>,
}

#[derive(Serialize)]
struct RoleBody {
    #[serde(flatten)]
    common: Common,
    grants: Vec<GrantBody>,
}

#[derive(Serialize)]
struct GrantBody {
    actions: Vec<String>,
    objects: Vec<String>,
}

#[derive(Serialize)]
struct BindingBody {
    #[serde(flatten)]
    common: Common,
    role: String,
    subjects: Vec<SubjectBody>,
}

#[derive(Serialize)]
struct SubjectBody {
    kind: String,
    name: String,
}

#[derive(Serialize)]
struct VolumeBody {
    #[serde(flatten)]
    common: Common,
    size_gib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    access_mode: String,
}

#[derive(Serialize)]
struct ModuleBody {
    #[serde(flatten)]
    common: Common,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{
        AccessBinding, AccessRole, Application, GraphBuilder, ResourceGroup, Secret,
        StatefulApplication,
    };
    use crate::models::SubjectKind;
    use crate::resolver::deploy_order;

    fn generate(builder: GraphBuilder) -> Vec<Artifact> {
        let context = CompileContext::default();
        let graph = builder.snapshot(&context).unwrap();
        let order = deploy_order(&graph).unwrap();
        InfraGenerator.generate(&graph, &order, &context).unwrap()
    }

    #[test]
    fn dependency_becomes_an_address_expression() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(StatefulApplication::named("db").image("postgres:16").storage(10))
                .with(Application::named("api").image("api:1").depends_on("db")),
        );
        let api = artifacts
            .iter()
            .find(|a| a.path().to_str().unwrap().contains("application-api"))
            .unwrap();
        assert!(api
            .content()
            .contains("\"manifold_stateful_application.db\""));
    }

    #[test]
    fn secret_block_is_sensitive_and_valueless() {
        let artifacts = generate(
            GraphBuilder::new().with(Secret::named("db-credentials").key("password")),
        );
        let content = artifacts[0].content();
        assert!(content.contains("\"manifold_secret\""));
        assert!(content.contains("\"db_credentials\""));
        assert!(content.contains("\"sensitive\": true"));
        assert!(content.contains("\"password\""));
    }

    #[test]
    fn secret_env_reference_uses_the_secret_address() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(Secret::named("db-credentials").key("password"))
                .with(Application::named("api").image("api:1").env_from_secret("db-credentials")),
        );
        let api = artifacts
            .iter()
            .find(|a| a.path().to_str().unwrap().contains("application-api"))
            .unwrap();
        assert!(api.content().contains("\"manifold_secret.db_credentials\""));
    }

    #[test]
    fn binding_references_role_by_address() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(AccessRole::named("reader").grant(["get"], ["secrets"]))
                .with(
                    AccessBinding::named("bind-reader")
                        .role("reader")
                        .subject(SubjectKind::User, "ops"),
                ),
        );
        let binding = artifacts
            .iter()
            .find(|a| a.path().to_str().unwrap().contains("access-binding"))
            .unwrap();
        assert!(binding.content().contains("\"manifold_access_role.reader\""));
    }

    #[test]
    fn group_renders_as_a_module_block() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(Application::named("api").image("api:1"))
                .with(ResourceGroup::named("stack").member("api")),
        );
        let group = artifacts
            .iter()
            .find(|a| a.path().to_str().unwrap().contains("resource-group"))
            .unwrap();
        assert!(group.content().contains("\"module\""));
        assert!(group.content().contains("\"manifold_application.api\""));
    }

    #[test]
    fn output_is_json_per_resource() {
        let artifacts = generate(
            GraphBuilder::new().with(Application::named("api").image("api:1")),
        );
        assert_eq!(
            artifacts[0].path().to_str().unwrap(),
            "infra/default-application-api.json"
        );
        let parsed: serde_json::Value = serde_json::from_str(artifacts[0].content()).unwrap();
        assert!(parsed.get("resource").is_some());
    }
}
