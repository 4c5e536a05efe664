//! Manifest target: Kubernetes-style YAML documents, one per resource
//!
//! Every resource maps to a typed document under a fixed `apiVersion`.
//! Ordering data is carried as annotations derived from the resolver's
//! order, never written back into the graph. Resource groups produce no
//! document of their own; members carry a group annotation instead.

use serde::Serialize;

use crate::context::CompileContext;
use crate::error::ManifoldResult;
use crate::graph::Graph;
use crate::models::{
    AppSpec, BatchJobSpec, ContainerSpec, Kind, LabelMap, Resource, ResourceId, ResourceSpec,
};
use crate::target::Target;

use super::{order_index, prerequisite_names, Artifact, Generator};

const API_VERSION: &str = "deploy.manifold.io/v1";
const ANNOTATION_ORDER: &str = "deploy.manifold.io/order";
const ANNOTATION_DEPENDS_ON: &str = "deploy.manifold.io/depends-on";
const ANNOTATION_GROUP: &str = "deploy.manifold.io/group";
const ANNOTATION_GENERATED_AT: &str = "deploy.manifold.io/generated-at";

/// Renders the manifest target
pub struct ManifestGenerator;

impl Generator for ManifestGenerator {
    fn target(&self) -> Target {
        Target::Manifest
    }

    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>> {
        let index = order_index(order);
        let membership = graph.group_membership();
        let mut artifacts = Vec::new();

        for id in order {
            let resource = graph.get(id).expect("order covers graph resources");
            if resource.kind() == Kind::ResourceGroup {
                continue;
            }

            let mut annotations = resource.annotations().clone();
            annotations.insert(
                ANNOTATION_ORDER.to_string(),
                index.get(id).copied().unwrap_or_default().to_string(),
            );
            let prerequisites = prerequisite_names(graph, id);
            if !prerequisites.is_empty() {
                annotations.insert(ANNOTATION_DEPENDS_ON.to_string(), prerequisites.join(","));
            }
            if let Some(group) = membership.get(id) {
                annotations.insert(ANNOTATION_GROUP.to_string(), group.clone());
            }
            if let Some(at) = context.timestamp {
                annotations.insert(ANNOTATION_GENERATED_AT.to_string(), at.to_rfc3339());
            }

            let metadata = Metadata {
                name: resource.name().to_string(),
                namespace: resource.namespace().to_string(),
                labels: resource.labels().clone(),
                annotations,
            };

            let content = render_document(resource, metadata)?;
            let path = format!(
                "{}/{}.{}",
                Target::Manifest.directory_name(),
                id.file_stem(),
                Target::Manifest.extension()
            );
            artifacts.push(Artifact::new(Target::Manifest, path, content));
        }

        Ok(artifacts)
    }
}

fn render_document(resource: &Resource, metadata: Metadata) -> ManifoldResult<String> {
    let doc = match resource.spec() {
        ResourceSpec::Application(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Workload",
            metadata,
            spec: workload_spec(spec, None),
        }),
        ResourceSpec::StatefulApplication(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "StatefulWorkload",
            metadata,
            spec: workload_spec(&spec.workload, Some(&spec.storage)),
        }),
        ResourceSpec::Secret(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Secret",
            metadata,
            spec: SecretSpecDoc {
                keys: spec.keys.clone(),
                external_source: spec.external_source.clone(),
            },
        }),
        ResourceSpec::ConfigData(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "ConfigData",
            metadata,
            spec: ConfigSpecDoc {
                data: spec.entries.clone(),
            },
        }),
        ResourceSpec::BatchJob(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Job",
            metadata,
            spec: job_spec(spec),
        }),
        ResourceSpec::ScheduledJob(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "CronJob",
            metadata,
            spec: CronJobSpecDoc {
                schedule: spec.schedule.clone(),
                concurrency: format!("{:?}", spec.concurrency).to_lowercase(),
                job: job_spec(&spec.job),
            },
        }),
        ResourceSpec::NetworkService(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Service",
            metadata,
            spec: ServiceSpecDoc {
                selector: spec.selector.clone(),
                backend: spec.backend.clone(),
                ports: spec.ports.iter().map(PortDoc::from).collect(),
                exposure: exposure_label(spec),
            },
        }),
        ResourceSpec::ExternalRoute(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Route",
            metadata,
            spec: RouteSpecDoc {
                host: spec.host.clone(),
                path_prefix: spec.path_prefix.clone(),
                service: spec.backend.clone(),
                public: spec.public,
                tls: spec.tls.as_ref().map(|tls| TlsDoc {
                    secret_name: tls.secret_name.clone(),
                }),
            },
        }),
        ResourceSpec::AccessRole(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "Role",
            metadata,
            spec: RoleSpecDoc {
                grants: spec
                    .grants
                    .iter()
                    .map(|grant| GrantDoc {
                        actions: grant.actions.clone(),
                        objects: grant.objects.clone(),
                    })
                    .collect(),
            },
        }),
        ResourceSpec::AccessBinding(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "RoleBinding",
            metadata,
            spec: BindingSpecDoc {
                role: spec.role.clone(),
                subjects: spec
                    .subjects
                    .iter()
                    .map(|subject| SubjectDoc {
                        kind: format!("{:?}", subject.kind).to_lowercase(),
                        name: subject.name.clone(),
                    })
                    .collect(),
            },
        }),
        ResourceSpec::Volume(spec) => to_yaml(Document {
            api_version: API_VERSION,
            kind: "VolumeClaim",
            metadata,
            spec: VolumeSpecDoc {
                size_gib: spec.size_gib,
                class: spec.class.clone(),
                access_mode: format!("{:?}", spec.access_mode),
            },
        }),
        ResourceSpec::ResourceGroup(_) => unreachable!("groups render no manifest document"),
    };
    Ok(doc)
}

fn to_yaml<T: Serialize>(doc: Document<T>) -> String {
    serde_yaml_ng::to_string(&doc).expect("typed manifest documents serialize")
}

fn exposure_label(spec: &crate::models::NetworkServiceSpec) -> String {
    match spec.exposure {
        crate::models::ExposureKind::ClusterInternal => "cluster-internal".to_string(),
        crate::models::ExposureKind::Node => "node".to_string(),
        crate::models::ExposureKind::LoadBalancer => "load-balancer".to_string(),
    }
}

fn workload_spec(spec: &AppSpec, storage: Option<&crate::models::StorageSpec>) -> WorkloadSpecDoc {
    WorkloadSpecDoc {
        image: spec.container.image.clone(),
        replicas: spec.replicas,
        command: spec.container.command.clone(),
        env: env_docs(&spec.container),
        env_from: env_from_docs(&spec.container),
        mounts: mount_docs(&spec.container),
        ports: spec.ports.iter().map(PortDoc::from).collect(),
        connects_to: spec.connect_to.clone(),
        resources: resources_doc(&spec.container),
        security: security_doc(&spec.container),
        health: spec.health.as_ref().map(|health| HealthDoc {
            path: health.path.clone(),
            port: health.port,
            period_seconds: health.period_seconds,
        }),
        storage: storage.map(|storage| StorageDoc {
            size_gib: storage.size_gib,
            class: storage.class.clone(),
        }),
    }
}

fn job_spec(spec: &BatchJobSpec) -> JobSpecDoc {
    JobSpecDoc {
        image: spec.container.image.clone(),
        command: spec.container.command.clone(),
        completions: spec.completions,
        parallelism: spec.parallelism,
        retries: spec.retries,
        env: env_docs(&spec.container),
        env_from: env_from_docs(&spec.container),
        mounts: mount_docs(&spec.container),
        resources: resources_doc(&spec.container),
        security: security_doc(&spec.container),
    }
}

fn env_docs(container: &ContainerSpec) -> Vec<EnvVarDoc> {
    container
        .env
        .iter()
        .map(|(name, value)| EnvVarDoc {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn env_from_docs(container: &ContainerSpec) -> Vec<EnvFromDoc> {
    let mut docs: Vec<EnvFromDoc> = container
        .env_from_secrets
        .iter()
        .map(|name| EnvFromDoc {
            secret_ref: Some(name.clone()),
            config_ref: None,
        })
        .collect();
    docs.extend(container.env_from_configs.iter().map(|name| EnvFromDoc {
        secret_ref: None,
        config_ref: Some(name.clone()),
    }));
    docs
}

fn mount_docs(container: &ContainerSpec) -> Vec<MountDoc> {
    let mut docs: Vec<MountDoc> = container
        .secret_mounts
        .iter()
        .map(|mount| MountDoc {
            kind: "secret",
            source: mount.source.clone(),
            mount_path: mount.mount_path.clone(),
        })
        .collect();
    docs.extend(container.config_mounts.iter().map(|mount| MountDoc {
        kind: "config",
        source: mount.source.clone(),
        mount_path: mount.mount_path.clone(),
    }));
    docs.extend(container.volumes.iter().map(|attachment| MountDoc {
        kind: "volume",
        source: attachment.volume.clone(),
        mount_path: attachment.mount_path.clone(),
    }));
    docs
}

fn resources_doc(container: &ContainerSpec) -> Option<ResourcesDoc> {
    if container.requests.is_none() && container.limits.is_none() {
        return None;
    }
    Some(ResourcesDoc {
        requests: container.requests.map(ComputeDoc::from),
        limits: container.limits.map(ComputeDoc::from),
    })
}

fn security_doc(container: &ContainerSpec) -> Option<SecurityDoc> {
    if !container.run_as_root && !container.privileged {
        return None;
    }
    Some(SecurityDoc {
        run_as_root: container.run_as_root,
        privileged: container.privileged,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document<T: Serialize> {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: T,
}

#[derive(Serialize)]
struct Metadata {
    name: String,
    namespace: String,
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    labels: LabelMap,
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    annotations: LabelMap,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadSpecDoc {
    image: String,
    replicas: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVarDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_from: Vec<EnvFromDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mounts: Vec<MountDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<PortDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connects_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<ResourcesDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<SecurityDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<HealthDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageDoc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobSpecDoc {
    image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    completions: u32,
    parallelism: u32,
    retries: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVarDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_from: Vec<EnvFromDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mounts: Vec<MountDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<ResourcesDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<SecurityDoc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CronJobSpecDoc {
    schedule: String,
    concurrency: String,
    job: JobSpecDoc,
}

#[derive(Serialize)]
struct EnvVarDoc {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvFromDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_ref: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MountDoc {
    kind: &'static str,
    source: String,
    mount_path: String,
}

#[derive(Serialize)]
struct PortDoc {
    name: String,
    port: u16,
    protocol: String,
}

impl From<&crate::models::PortSpec> for PortDoc {
    fn from(port: &crate::models::PortSpec) -> Self {
        Self {
            name: port.name.clone(),
            port: port.port,
            protocol: format!("{:?}", port.protocol).to_uppercase(),
        }
    }
}

#[derive(Serialize)]
struct ResourcesDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    requests: Option<ComputeDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limits: Option<ComputeDoc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputeDoc {
    cpu_millis: u32,
    memory_mib: u32,
}

impl From<crate::models::ComputeQuantity> for ComputeDoc {
    fn from(quantity: crate::models::ComputeQuantity) -> Self {
        Self {
            cpu_millis: quantity.cpu_millis,
            memory_mib: quantity.memory_mib,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecurityDoc {
    run_as_root: bool,
    privileged: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthDoc {
    path: String,
    port: u16,
    period_seconds: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageDoc {
    size_gib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretSpecDoc {
    keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_source: Option<String>,
}

#[derive(Serialize)]
struct ConfigSpecDoc {
    data: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ServiceSpecDoc {
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    selector: LabelMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<PortDoc>,
    exposure: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteSpecDoc {
    host: String,
    path_prefix: String,
    service: String,
    public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<TlsDoc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TlsDoc {
    secret_name: String,
}

#[derive(Serialize)]
struct RoleSpecDoc {
    grants: Vec<GrantDoc>,
}

#[derive(Serialize)]
struct GrantDoc {
    actions: Vec<String>,
    objects: Vec<String>,
}

#[derive(Serialize)]
struct BindingSpecDoc {
    role: String,
    subjects: Vec<SubjectDoc>,
}

#[derive(Serialize)]
struct SubjectDoc {
    kind: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeSpecDoc {
    size_gib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    access_mode: String,
}
