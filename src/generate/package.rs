//! Package target: a fixed directory skeleton with a metadata file, a
//! values file, and per-kind template files
//!
//! Tunable attributes (images, replica counts, storage sizes, route hosts)
//! live in `values.yaml`; templates reference them through
//! `{{ values.<section>.<key>.<field> }}` placeholders so one package
//! installs with different settings. Template files carry a two-digit prefix
//! taken from the deploy order, so applying them in file order respects
//! dependencies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml_ng::Value;

use crate::context::CompileContext;
use crate::error::ManifoldResult;
use crate::graph::Graph;
use crate::models::{Kind, Resource, ResourceId, ResourceSpec};
use crate::target::Target;

use super::{sanitize_identifier, Artifact, Generator};

/// Renders the package target
pub struct PackageGenerator;

impl Generator for PackageGenerator {
    fn target(&self) -> Target {
        Target::Package
    }

    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>> {
        let dir = Target::Package.directory_name();
        let keys = values_keys(graph);
        let mut artifacts = Vec::new();

        let meta = PackageMeta {
            name: context.package_name.clone(),
            version: "0.1.0",
            description: "Deployment package generated from a manifold resource graph",
            generated_at: context.timestamp.map(|at| at.to_rfc3339()),
        };
        artifacts.push(Artifact::new(
            Target::Package,
            format!("{dir}/package.yaml"),
            to_yaml(&meta),
        ));

        artifacts.push(Artifact::new(
            Target::Package,
            format!("{dir}/values.yaml"),
            to_yaml(&build_values(graph, order, &keys)),
        ));

        // One template file per kind present, prefixed by the kind's first
        // position in the deploy order.
        let mut by_kind: BTreeMap<usize, (Kind, Vec<&ResourceId>)> = BTreeMap::new();
        for id in order {
            if id.kind == Kind::ResourceGroup {
                continue;
            }
            by_kind
                .entry(first_position_of_kind(order, id.kind))
                .or_insert_with(|| (id.kind, Vec::new()))
                .1
                .push(id);
        }

        for (prefix, (kind, ids)) in by_kind {
            let mut content = String::new();
            for id in ids {
                let resource = graph.get(id).expect("order covers graph resources");
                content.push_str("---\n");
                content.push_str(&to_yaml(&template_doc(resource, &keys)));
            }
            artifacts.push(Artifact::new(
                Target::Package,
                format!("{dir}/templates/{prefix:02}-{}.yaml", kind.label()),
                content,
            ));
        }

        Ok(artifacts)
    }
}

fn first_position_of_kind(order: &[ResourceId], kind: Kind) -> usize {
    order
        .iter()
        .position(|id| id.kind == kind)
        .expect("kind taken from the order itself")
}

fn to_yaml<T: Serialize>(value: &T) -> String {
    serde_yaml_ng::to_string(value).expect("typed package documents serialize")
}

/// Identifier-safe values key per resource; namespace-prefixed only on
/// collision
fn values_keys(graph: &Graph) -> BTreeMap<ResourceId, String> {
    let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in graph.resources() {
        *by_name.entry(resource.name()).or_default() += 1;
    }

    graph
        .resources()
        .map(|resource| {
            let key = if by_name[resource.name()] > 1 {
                sanitize_identifier(&format!(
                    "{}-{}-{}",
                    resource.namespace(),
                    resource.kind().label(),
                    resource.name()
                ))
            } else {
                sanitize_identifier(resource.name())
            };
            (resource.id().clone(), key)
        })
        .collect()
}

fn build_values(
    graph: &Graph,
    order: &[ResourceId],
    keys: &BTreeMap<ResourceId, String>,
) -> ValuesDoc {
    let mut values = ValuesDoc::default();

    for id in order {
        let resource = graph.get(id).expect("order covers graph resources");
        let key = keys[id].clone();
        match resource.spec() {
            ResourceSpec::Application(spec) => {
                values.applications.insert(
                    key,
                    AppValues {
                        image: spec.container.image.clone(),
                        replicas: spec.replicas,
                        storage_gib: None,
                    },
                );
            }
            ResourceSpec::StatefulApplication(spec) => {
                values.applications.insert(
                    key,
                    AppValues {
                        image: spec.workload.container.image.clone(),
                        replicas: spec.workload.replicas,
                        storage_gib: Some(spec.storage.size_gib),
                    },
                );
            }
            ResourceSpec::BatchJob(spec) => {
                values.jobs.insert(
                    key,
                    JobValues {
                        image: spec.container.image.clone(),
                        parallelism: spec.parallelism,
                        schedule: None,
                    },
                );
            }
            ResourceSpec::ScheduledJob(spec) => {
                values.jobs.insert(
                    key,
                    JobValues {
                        image: spec.job.container.image.clone(),
                        parallelism: spec.job.parallelism,
                        schedule: Some(spec.schedule.clone()),
                    },
                );
            }
            ResourceSpec::Secret(spec) => {
                values.secrets.insert(
                    key,
                    SecretValues {
                        keys: spec.keys.clone(),
                    },
                );
            }
            ResourceSpec::ConfigData(spec) => {
                values.configs.insert(key, spec.entries.clone());
            }
            ResourceSpec::Volume(spec) => {
                values.volumes.insert(
                    key,
                    VolumeValues {
                        size_gib: spec.size_gib,
                    },
                );
            }
            ResourceSpec::ExternalRoute(spec) => {
                values.routes.insert(
                    key,
                    RouteValues {
                        host: spec.host.clone(),
                    },
                );
            }
            ResourceSpec::ResourceGroup(spec) => {
                values.groups.insert(
                    key,
                    GroupValues {
                        members: spec.members.clone(),
                    },
                );
            }
            ResourceSpec::NetworkService(_)
            | ResourceSpec::AccessRole(_)
            | ResourceSpec::AccessBinding(_) => {}
        }
    }

    values
}

/// A templated rendition of one resource: identity fields plus a body whose
/// tunable attributes are values placeholders.
fn template_doc(resource: &Resource, keys: &BTreeMap<ResourceId, String>) -> TemplateDoc {
    let key = &keys[resource.id()];
    let mut body: BTreeMap<&'static str, Value> = BTreeMap::new();

    let placeholder =
        |section: &str, field: &str| Value::String(format!("{{{{ values.{section}.{key}.{field} }}}}"));

    match resource.spec() {
        ResourceSpec::Application(spec) => {
            body.insert("image", placeholder("applications", "image"));
            body.insert("replicas", placeholder("applications", "replicas"));
            insert_reference_body(&mut body, &spec.container);
        }
        ResourceSpec::StatefulApplication(spec) => {
            body.insert("image", placeholder("applications", "image"));
            body.insert("replicas", placeholder("applications", "replicas"));
            body.insert("storageGib", placeholder("applications", "storage_gib"));
            insert_reference_body(&mut body, &spec.workload.container);
        }
        ResourceSpec::BatchJob(spec) => {
            body.insert("image", placeholder("jobs", "image"));
            body.insert("parallelism", placeholder("jobs", "parallelism"));
            insert_reference_body(&mut body, &spec.container);
        }
        ResourceSpec::ScheduledJob(spec) => {
            body.insert("image", placeholder("jobs", "image"));
            body.insert("schedule", placeholder("jobs", "schedule"));
            insert_reference_body(&mut body, &spec.job.container);
        }
        ResourceSpec::Secret(_) => {
            body.insert("keys", placeholder("secrets", "keys"));
            body.insert("external", Value::Bool(true));
        }
        ResourceSpec::ConfigData(_) => {
            body.insert(
                "data",
                Value::String(format!("{{{{ values.configs.{key} }}}}")),
            );
        }
        ResourceSpec::Volume(_) => {
            body.insert("sizeGib", placeholder("volumes", "size_gib"));
        }
        ResourceSpec::NetworkService(spec) => {
            if !spec.selector.is_empty() {
                body.insert("selector", to_value(&spec.selector));
            }
            if let Some(backend) = &spec.backend {
                body.insert("backend", Value::String(backend.clone()));
            }
        }
        ResourceSpec::ExternalRoute(spec) => {
            body.insert("host", placeholder("routes", "host"));
            body.insert("service", Value::String(spec.backend.clone()));
            if let Some(tls) = &spec.tls {
                body.insert("tlsSecret", Value::String(tls.secret_name.clone()));
            }
        }
        ResourceSpec::AccessRole(spec) => {
            body.insert("grants", to_value(&spec.grants));
        }
        ResourceSpec::AccessBinding(spec) => {
            body.insert("role", Value::String(spec.role.clone()));
            body.insert("subjects", to_value(&spec.subjects));
        }
        ResourceSpec::ResourceGroup(_) => unreachable!("groups render no template"),
    }

    TemplateDoc {
        kind: kind_name(resource.kind()),
        name: resource.name().to_string(),
        namespace: resource.namespace().to_string(),
        body,
    }
}

/// References stay literal in templates; they bind resources to each other,
/// not to installer-tunable values.
fn insert_reference_body(body: &mut BTreeMap<&'static str, Value>, container: &crate::models::ContainerSpec) {
    if !container.env_from_secrets.is_empty() {
        body.insert("secretRefs", to_value(&container.env_from_secrets));
    }
    if !container.env_from_configs.is_empty() {
        body.insert("configRefs", to_value(&container.env_from_configs));
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_yaml_ng::to_value(value).expect("typed template fragments serialize")
}

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Application => "Workload",
        Kind::StatefulApplication => "StatefulWorkload",
        Kind::Secret => "Secret",
        Kind::ConfigData => "ConfigData",
        Kind::BatchJob => "Job",
        Kind::ScheduledJob => "CronJob",
        Kind::NetworkService => "Service",
        Kind::ExternalRoute => "Route",
        Kind::AccessRole => "Role",
        Kind::AccessBinding => "RoleBinding",
        Kind::Volume => "VolumeClaim",
        Kind::ResourceGroup => "Group",
    }
}

#[derive(Serialize)]
struct PackageMeta {
    name: String,
    version: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_at: Option<String>,
}

#[derive(Default, Serialize)]
struct ValuesDoc {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    applications: BTreeMap<String, AppValues>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    jobs: BTreeMap<String, JobValues>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    secrets: BTreeMap<String, SecretValues>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    configs: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<String, VolumeValues>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    routes: BTreeMap<String, RouteValues>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    groups: BTreeMap<String, GroupValues>,
}

#[derive(Serialize)]
struct AppValues {
    image: String,
    replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_gib: Option<u32>,
}

#[derive(Serialize)]
struct JobValues {
    image: String,
    parallelism: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<String>,
}

#[derive(Serialize)]
struct SecretValues {
    keys: Vec<String>,
}

#[derive(Serialize)]
struct VolumeValues {
    size_gib: u32,
}

#[derive(Serialize)]
struct RouteValues {
    host: String,
}

#[derive(Serialize)]
struct GroupValues {
    members: Vec<String>,
}

#[derive(Serialize)]
struct TemplateDoc {
    kind: &'static str,
    name: String,
    namespace: String,
    #[serde(flatten)]
    body: BTreeMap<&'static str, Value>,
}
