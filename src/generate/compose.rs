//! Compose target: one aggregate file with service, volume, config, and
//! secret blocks
//!
//! Workloads become services; dependencies become `depends_on` entries;
//! secrets stay referential (`${VAR}` substitutions plus an external secrets
//! block) so no secret value ever lands in the file. Routes and groups
//! surface as labels on the backing services. Access-control kinds have no
//! compose equivalent and fail this target.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::CompileContext;
use crate::error::{ManifoldError, ManifoldResult};
use crate::graph::Graph;
use crate::models::{
    ContainerSpec, ExposureKind, Kind, Resource, ResourceId, ResourceSpec, SecretSpec,
};
use crate::target::Target;

use super::{env_var_name, Artifact, Generator};

/// Renders the compose target
pub struct ComposeGenerator;

impl Generator for ComposeGenerator {
    fn target(&self) -> Target {
        Target::Compose
    }

    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        _context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>> {
        if let Some(resource) = graph
            .resources()
            .find(|r| matches!(r.kind(), Kind::AccessRole | Kind::AccessBinding))
        {
            return Err(ManifoldError::Generate {
                target: Target::Compose,
                kind: resource.kind(),
                name: resource.name().to_string(),
                message: "access-control objects have no compose equivalent".to_string(),
            });
        }

        let names = service_names(graph);
        let mut doc = ComposeDoc::default();

        for id in order {
            let resource = graph.get(id).expect("order covers graph resources");
            match resource.spec() {
                ResourceSpec::Application(spec) => {
                    let service = workload_service(
                        graph,
                        resource,
                        &names,
                        &spec.container,
                        Some(spec),
                        "unless-stopped",
                        &mut doc,
                    );
                    doc.services.insert(names[id].clone(), service);
                }
                ResourceSpec::StatefulApplication(spec) => {
                    let mut service = workload_service(
                        graph,
                        resource,
                        &names,
                        &spec.workload.container,
                        Some(&spec.workload),
                        "unless-stopped",
                        &mut doc,
                    );
                    let volume_name = format!("{}-data", resource.name());
                    service
                        .volumes
                        .push(format!("{volume_name}:/var/lib/{}", resource.name()));
                    let mut decl = VolumeDecl::default();
                    if let Some(class) = &spec.storage.class {
                        decl.labels.insert("manifold.class".to_string(), class.clone());
                    }
                    doc.volumes.insert(volume_name, decl);
                    doc.services.insert(names[id].clone(), service);
                }
                ResourceSpec::BatchJob(spec) => {
                    let mut service = workload_service(
                        graph,
                        resource,
                        &names,
                        &spec.container,
                        None,
                        "on-failure",
                        &mut doc,
                    );
                    service
                        .labels
                        .insert("manifold.kind".to_string(), resource.kind().label().to_string());
                    doc.services.insert(names[id].clone(), service);
                }
                ResourceSpec::ScheduledJob(spec) => {
                    let mut service = workload_service(
                        graph,
                        resource,
                        &names,
                        &spec.job.container,
                        None,
                        "on-failure",
                        &mut doc,
                    );
                    service
                        .labels
                        .insert("manifold.kind".to_string(), resource.kind().label().to_string());
                    service
                        .labels
                        .insert("manifold.schedule".to_string(), spec.schedule.clone());
                    doc.services.insert(names[id].clone(), service);
                }
                ResourceSpec::Secret(_) => {
                    // Keys surface through the consuming services' env blocks.
                    doc.secrets
                        .insert(resource.name().to_string(), SecretDecl { external: true });
                }
                ResourceSpec::ConfigData(spec) => {
                    let content = spec
                        .entries
                        .iter()
                        .map(|(key, value)| format!("{key}={value}\n"))
                        .collect::<String>();
                    doc.configs
                        .insert(resource.name().to_string(), ConfigDecl { content });
                }
                ResourceSpec::Volume(spec) => {
                    let mut decl = VolumeDecl::default();
                    if let Some(class) = &spec.class {
                        decl.labels.insert("manifold.class".to_string(), class.clone());
                    }
                    doc.volumes.insert(resource.name().to_string(), decl);
                }
                ResourceSpec::NetworkService(_)
                | ResourceSpec::ExternalRoute(_)
                | ResourceSpec::ResourceGroup(_) => {
                    // Applied onto backing services in the wiring pass below.
                }
                ResourceSpec::AccessRole(_) | ResourceSpec::AccessBinding(_) => {
                    unreachable!("rejected before rendering")
                }
            }
        }

        apply_wiring(graph, &names, &mut doc);

        let path = format!("{}/compose.yaml", Target::Compose.directory_name());
        let content = serde_yaml_ng::to_string(&doc).expect("typed compose document serializes");
        Ok(vec![Artifact::new(Target::Compose, path, content)])
    }
}

/// Compose has no namespaces: use the plain resource name unless it appears
/// in more than one namespace among compose-rendered kinds.
fn service_names(graph: &Graph) -> BTreeMap<ResourceId, String> {
    let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in graph.resources().filter(|r| r.kind().is_workload()) {
        *by_name.entry(resource.name()).or_default() += 1;
    }

    graph
        .resources()
        .filter(|r| r.kind().is_workload())
        .map(|resource| {
            let name = if by_name[resource.name()] > 1 {
                format!("{}-{}", resource.namespace(), resource.name())
            } else {
                resource.name().to_string()
            };
            (resource.id().clone(), name)
        })
        .collect()
}

fn workload_service(
    graph: &Graph,
    resource: &Resource,
    names: &BTreeMap<ResourceId, String>,
    container: &ContainerSpec,
    app: Option<&crate::models::AppSpec>,
    restart: &'static str,
    doc: &mut ComposeDoc,
) -> Service {
    let mut environment = container.env.clone();

    for secret_name in &container.env_from_secrets {
        for secret in secret_resources(graph, resource.namespace(), secret_name) {
            if secret.keys.is_empty() {
                environment.insert(
                    secret_name.clone(),
                    format!("${{{}}}", env_var_name(secret_name, "value")),
                );
            }
            for key in &secret.keys {
                environment.insert(key.clone(), format!("${{{}}}", env_var_name(secret_name, key)));
            }
            doc.secrets
                .insert(secret_name.clone(), SecretDecl { external: true });
        }
    }

    for config_name in &container.env_from_configs {
        for referent in graph.lookup_named(resource.namespace(), config_name) {
            if let ResourceSpec::ConfigData(config) = referent.spec() {
                for (key, value) in &config.entries {
                    environment.insert(key.clone(), value.clone());
                }
            }
        }
    }

    let mut secrets: Vec<FileRef> = container
        .secret_mounts
        .iter()
        .map(|mount| FileRef {
            source: mount.source.clone(),
            target: mount.mount_path.clone(),
        })
        .collect();
    for mount in &container.secret_mounts {
        doc.secrets
            .insert(mount.source.clone(), SecretDecl { external: true });
    }
    secrets.sort();

    let mut configs: Vec<FileRef> = container
        .config_mounts
        .iter()
        .map(|mount| FileRef {
            source: mount.source.clone(),
            target: mount.mount_path.clone(),
        })
        .collect();
    configs.sort();

    let mut volumes: Vec<String> = container
        .volumes
        .iter()
        .map(|attachment| format!("{}:{}", attachment.volume, attachment.mount_path))
        .collect();
    volumes.sort();

    let mut depends_on: Vec<String> = graph
        .ordering_edges()
        .into_iter()
        .filter(|(prerequisite, dependent)| {
            dependent == resource.id() && prerequisite.kind.is_workload() && prerequisite != dependent
        })
        .filter_map(|(prerequisite, _)| names.get(&prerequisite).cloned())
        .collect();
    depends_on.sort();
    depends_on.dedup();

    let (expose, deploy, healthcheck) = match app {
        Some(app) => {
            let expose: Vec<String> = app.ports.iter().map(|p| p.port.to_string()).collect();
            let deploy = Some(Deploy {
                replicas: app.replicas,
            });
            let healthcheck = app.health.as_ref().map(|health| HealthCheck {
                test: vec![
                    "CMD".to_string(),
                    "curl".to_string(),
                    "-f".to_string(),
                    format!("http://localhost:{}{}", health.port, health.path),
                ],
                interval: format!("{}s", health.period_seconds),
            });
            (expose, deploy, healthcheck)
        }
        None => (Vec::new(), None, None),
    };

    Service {
        image: container.image.clone(),
        command: container.command.clone(),
        environment,
        depends_on,
        expose,
        ports: Vec::new(),
        volumes,
        configs,
        secrets,
        deploy,
        restart,
        healthcheck,
        labels: resource.labels().clone(),
    }
}

fn secret_resources<'g>(graph: &'g Graph, namespace: &str, name: &str) -> Vec<&'g SecretSpec> {
    graph
        .lookup_named(namespace, name)
        .into_iter()
        .filter_map(|r| match r.spec() {
            ResourceSpec::Secret(spec) => Some(spec),
            _ => None,
        })
        .collect()
}

/// Second pass: network services publish ports on their backing services,
/// routes and groups surface as labels.
fn apply_wiring(graph: &Graph, names: &BTreeMap<ResourceId, String>, doc: &mut ComposeDoc) {
    for resource in graph.resources() {
        match resource.spec() {
            ResourceSpec::NetworkService(spec) => {
                let publish = !matches!(spec.exposure, ExposureKind::ClusterInternal);
                for backend in backend_workloads(graph, resource) {
                    let Some(service) = names.get(backend.id()).and_then(|n| doc.services.get_mut(n))
                    else {
                        continue;
                    };
                    if publish {
                        for port in &spec.ports {
                            service.ports.push(format!("{}:{}", port.port, port.port));
                        }
                        service.ports.sort();
                        service.ports.dedup();
                    }
                    service
                        .labels
                        .insert("manifold.service".to_string(), resource.name().to_string());
                }
            }
            ResourceSpec::ExternalRoute(spec) => {
                for backend in route_backends(graph, resource) {
                    let Some(service) = names.get(backend.id()).and_then(|n| doc.services.get_mut(n))
                    else {
                        continue;
                    };
                    service
                        .labels
                        .insert("manifold.route/host".to_string(), spec.host.clone());
                    service
                        .labels
                        .insert("manifold.route/path".to_string(), spec.path_prefix.clone());
                    if let Some(tls) = &spec.tls {
                        service.labels.insert(
                            "manifold.route/tls-secret".to_string(),
                            tls.secret_name.clone(),
                        );
                    }
                }
            }
            ResourceSpec::ResourceGroup(group) => {
                for member in &group.members {
                    for found in graph.lookup_named(resource.namespace(), member) {
                        if let Some(service) =
                            names.get(found.id()).and_then(|n| doc.services.get_mut(n))
                        {
                            service
                                .labels
                                .insert("manifold.group".to_string(), resource.name().to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Workloads backing a network service, via direct backend or selector
fn backend_workloads<'g>(graph: &'g Graph, service: &Resource) -> Vec<&'g Resource> {
    let ResourceSpec::NetworkService(spec) = service.spec() else {
        return Vec::new();
    };
    if let Some(backend) = &spec.backend {
        return graph
            .lookup_named(service.namespace(), backend)
            .into_iter()
            .filter(|r| r.kind().is_workload())
            .collect();
    }
    graph.workloads_matching(service.namespace(), &spec.selector)
}

/// Workloads ultimately behind an external route (route -> service ->
/// workloads)
fn route_backends<'g>(graph: &'g Graph, route: &Resource) -> Vec<&'g Resource> {
    let ResourceSpec::ExternalRoute(spec) = route.spec() else {
        return Vec::new();
    };
    graph
        .lookup_named(route.namespace(), &spec.backend)
        .into_iter()
        .filter(|r| r.kind() == Kind::NetworkService)
        .flat_map(|service| backend_workloads(graph, service))
        .collect()
}

#[derive(Debug, Default, Serialize)]
struct ComposeDoc {
    services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    volumes: BTreeMap<String, VolumeDecl>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    configs: BTreeMap<String, ConfigDecl>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    secrets: BTreeMap<String, SecretDecl>,
}

#[derive(Debug, Serialize)]
struct Service {
    image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    expose: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    configs: Vec<FileRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secrets: Vec<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deploy: Option<Deploy>,
    restart: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthcheck: Option<HealthCheck>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
struct FileRef {
    source: String,
    target: String,
}

#[derive(Debug, Serialize)]
struct Deploy {
    replicas: u32,
}

#[derive(Debug, Serialize)]
struct HealthCheck {
    test: Vec<String>,
    interval: String,
}

#[derive(Debug, Default, Serialize)]
struct VolumeDecl {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ConfigDecl {
    content: String,
}

#[derive(Debug, Serialize)]
struct SecretDecl {
    external: bool,
}
