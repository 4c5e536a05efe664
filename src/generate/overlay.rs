//! Overlay target: per-resource strategic patch documents plus an aggregate
//! index
//!
//! Each patch names its target by `(kind, name, namespace)` and layers
//! ordering annotations, group membership, and reference wiring on top of a
//! base deployment. The index lists the patch files in deploy order so an
//! overlay engine applies them dependency-first.

use serde::Serialize;

use crate::context::CompileContext;
use crate::error::ManifoldResult;
use crate::graph::Graph;
use crate::models::{ContainerSpec, Kind, LabelMap, ResourceId, ResourceSpec};
use crate::target::Target;

use super::{order_index, prerequisite_names, Artifact, Generator};

/// Renders the overlay target
pub struct OverlayGenerator;

impl Generator for OverlayGenerator {
    fn target(&self) -> Target {
        Target::Overlay
    }

    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>> {
        let dir = Target::Overlay.directory_name();
        let index = order_index(order);
        let membership = graph.group_membership();
        let mut artifacts = Vec::new();
        let mut files = Vec::new();

        for id in order {
            let resource = graph.get(id).expect("order covers graph resources");
            if resource.kind() == Kind::ResourceGroup {
                continue;
            }

            let mut annotations = resource.annotations().clone();
            annotations.insert(
                "deploy.manifold.io/order".to_string(),
                index.get(id).copied().unwrap_or_default().to_string(),
            );
            let prerequisites = prerequisite_names(graph, id);
            if !prerequisites.is_empty() {
                annotations.insert(
                    "deploy.manifold.io/depends-on".to_string(),
                    prerequisites.join(","),
                );
            }
            if let Some(group) = membership.get(id) {
                annotations.insert("deploy.manifold.io/group".to_string(), group.clone());
            }
            if let Some(at) = context.timestamp {
                annotations.insert(
                    "deploy.manifold.io/generated-at".to_string(),
                    at.to_rfc3339(),
                );
            }

            let patch = PatchDoc {
                target: PatchTarget {
                    kind: kind_name(resource.kind()),
                    name: resource.name().to_string(),
                    namespace: resource.namespace().to_string(),
                },
                patch: PatchBody {
                    metadata: PatchMetadata {
                        labels: resource.labels().clone(),
                        annotations,
                    },
                    spec: container_of(resource.spec()).and_then(patch_spec),
                },
            };

            let file = format!("{}.{}", id.file_stem(), Target::Overlay.extension());
            files.push(file.clone());
            artifacts.push(Artifact::new(
                Target::Overlay,
                format!("{dir}/{file}"),
                serde_yaml_ng::to_string(&patch).expect("typed patch documents serialize"),
            ));
        }

        let index_doc = IndexDoc { patches: files };
        artifacts.push(Artifact::new(
            Target::Overlay,
            format!("{dir}/overlay.yaml"),
            serde_yaml_ng::to_string(&index_doc).expect("typed index document serializes"),
        ));

        Ok(artifacts)
    }
}

fn container_of(spec: &ResourceSpec) -> Option<&ContainerSpec> {
    match spec {
        ResourceSpec::Application(spec) => Some(&spec.container),
        ResourceSpec::StatefulApplication(spec) => Some(&spec.workload.container),
        ResourceSpec::BatchJob(spec) => Some(&spec.container),
        ResourceSpec::ScheduledJob(spec) => Some(&spec.job.container),
        _ => None,
    }
}

/// Reference wiring worth patching: secret/config injection
fn patch_spec(container: &ContainerSpec) -> Option<PatchSpec> {
    if container.env_from_secrets.is_empty() && container.env_from_configs.is_empty() {
        return None;
    }
    Some(PatchSpec {
        secret_refs: container.env_from_secrets.clone(),
        config_refs: container.env_from_configs.clone(),
    })
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
struct PatchDoc {
    target: PatchTarget,
    patch: PatchBody,
}

#[derive(Serialize)]
struct PatchTarget {
    kind: &'static str,
    name: String,
    namespace: String,
}

#[derive(Serialize)]
struct PatchBody {
    metadata: PatchMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<PatchSpec>,
}

#[derive(Serialize)]
struct PatchMetadata {
    #[serde(skip_serializing_if = "LabelMap::is_empty")]
    labels: LabelMap,
    annotations: LabelMap,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secret_refs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    config_refs: Vec<String>,
}

#[derive(Serialize)]
struct IndexDoc {
    patches: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Application, GraphBuilder, Secret, StatefulApplication};
    use crate::resolver::deploy_order;

    fn generate(builder: GraphBuilder) -> Vec<Artifact> {
        let context = CompileContext::default();
        let graph = builder.snapshot(&context).unwrap();
        let order = deploy_order(&graph).unwrap();
        OverlayGenerator.generate(&graph, &order, &context).unwrap()
    }

    #[test]
    fn emits_patch_per_resource_plus_index() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(StatefulApplication::named("db").image("postgres:16").storage(10))
                .with(Application::named("api").image("api:1").depends_on("db")),
        );
        assert_eq!(artifacts.len(), 3);
        assert_eq!(
            artifacts.last().unwrap().path().to_str().unwrap(),
            "overlay/overlay.yaml"
        );
    }

    #[test]
    fn index_lists_patches_in_deploy_order() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(StatefulApplication::named("db").image("postgres:16").storage(10))
                .with(Application::named("api").image("api:1").depends_on("db")),
        );
        let index = artifacts.last().unwrap().content();
        let db_pos = index.find("db.yaml").unwrap();
        let api_pos = index.find("api.yaml").unwrap();
        assert!(db_pos < api_pos);
    }

    #[test]
    fn patch_targets_name_kind_and_namespace() {
        let artifacts = generate(
            GraphBuilder::new().with(Application::named("api").image("api:1")),
        );
        let content = artifacts[0].content();
        assert!(content.contains("kind: Workload"));
        assert!(content.contains("name: api"));
        assert!(content.contains("namespace: default"));
        assert!(content.contains("deploy.manifold.io/order: '0'"));
    }

    #[test]
    fn secret_reference_appears_in_patch_spec() {
        let artifacts = generate(
            GraphBuilder::new()
                .with(Secret::named("token").key("value"))
                .with(Application::named("api").image("api:1").env_from_secret("token")),
        );
        let api = artifacts
            .iter()
            .find(|a| a.path().to_str().unwrap().contains("application-api"))
            .unwrap();
        assert!(api.content().contains("secretRefs:\n    - token"));
    }
}
