//! Resource graph builder
//!
//! One constructor per resource kind, each returning a by-value builder.
//! Configuration methods consume and return the builder, so independently
//! held chains never share hidden mutable state; `Clone` a builder to branch
//! it. List-typed attributes append in call order, scalar attributes are
//! last-call-wins.
//!
//! `GraphBuilder` is the session: `with` registers a declaration and
//! `snapshot` freezes everything into an immutable [`Graph`]. Duplicate
//! identities are detected at snapshot time, not eagerly, so rebinding a
//! builder variable during construction stays legal.

mod support;
mod workloads;

pub use support::{
    AccessBinding, AccessRole, ConfigData, ExternalRoute, NetworkService, ResourceGroup, Secret,
    Volume,
};
pub use workloads::{Application, BatchJob, ScheduledJob, StatefulApplication};

use std::collections::BTreeMap;

use crate::context::CompileContext;
use crate::error::{ManifoldError, ManifoldResult};
use crate::graph::Graph;
use crate::models::{LabelMap, Resource, ResourceId, ResourceSpec};

/// Metadata shared by every builder: identity, labels, explicit dependencies
#[derive(Debug, Clone, Default)]
pub(crate) struct DeclMeta {
    pub name: String,
    pub namespace: Option<String>,
    pub labels: LabelMap,
    pub annotations: LabelMap,
    pub depends_on: Vec<String>,
}

impl DeclMeta {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Implements the metadata methods every builder shares.
macro_rules! common_methods {
    () => {
        /// Place the resource in an explicit namespace.
        ///
        /// Resources without one pick up the context's default namespace at
        /// snapshot time.
        pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
            self.meta.namespace = Some(namespace.into());
            self
        }

        /// Attach a label
        pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.meta.labels.insert(key.into(), value.into());
            self
        }

        /// Attach an annotation
        pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.meta.annotations.insert(key.into(), value.into());
            self
        }

        /// Declare an explicit ordering dependency on another resource
        pub fn depends_on(mut self, name: impl Into<String>) -> Self {
            self.meta.depends_on.push(name.into());
            self
        }
    };
}

pub(crate) use common_methods;

/// A registered declaration, one variant per resource kind
#[derive(Debug, Clone)]
pub enum Declaration {
    Application(Application),
    StatefulApplication(StatefulApplication),
    Secret(Secret),
    ConfigData(ConfigData),
    BatchJob(BatchJob),
    ScheduledJob(ScheduledJob),
    NetworkService(NetworkService),
    ExternalRoute(ExternalRoute),
    AccessRole(AccessRole),
    AccessBinding(AccessBinding),
    Volume(Volume),
    ResourceGroup(ResourceGroup),
}

impl Declaration {
    fn freeze(self, default_namespace: &str) -> Resource {
        let (meta, spec) = match self {
            Declaration::Application(b) => b.into_parts(),
            Declaration::StatefulApplication(b) => b.into_parts(),
            Declaration::Secret(b) => b.into_parts(),
            Declaration::ConfigData(b) => b.into_parts(),
            Declaration::BatchJob(b) => b.into_parts(),
            Declaration::ScheduledJob(b) => b.into_parts(),
            Declaration::NetworkService(b) => b.into_parts(),
            Declaration::ExternalRoute(b) => b.into_parts(),
            Declaration::AccessRole(b) => b.into_parts(),
            Declaration::AccessBinding(b) => b.into_parts(),
            Declaration::Volume(b) => b.into_parts(),
            Declaration::ResourceGroup(b) => b.into_parts(),
        };

        let namespace = meta
            .namespace
            .unwrap_or_else(|| default_namespace.to_string());
        let id = ResourceId::new(spec.kind(), namespace, meta.name);
        Resource::new(id, meta.labels, meta.annotations, meta.depends_on, spec)
    }
}

macro_rules! declaration_from {
    ($($builder:ident),+ $(,)?) => {
        $(
            impl From<$builder> for Declaration {
                fn from(builder: $builder) -> Self {
                    Declaration::$builder(builder)
                }
            }
        )+
    };
}

declaration_from!(
    Application,
    StatefulApplication,
    Secret,
    ConfigData,
    BatchJob,
    ScheduledJob,
    NetworkService,
    ExternalRoute,
    AccessRole,
    AccessBinding,
    Volume,
    ResourceGroup,
);

/// Builder session collecting declarations for one graph
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    declarations: Vec<Declaration>,
}

impl GraphBuilder {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration
    pub fn with(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }

    /// Number of registered declarations
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Freeze every declaration into an immutable graph.
    ///
    /// Each call produces a fresh, self-contained graph; snapshots taken
    /// from independently mutated clones of a session never share state.
    ///
    /// # Errors
    ///
    /// `DuplicateName` when two declarations share `(kind, namespace, name)`;
    /// `GroupOwnership` when a resource is claimed by two groups.
    pub fn snapshot(&self, context: &CompileContext) -> ManifoldResult<Graph> {
        let mut resources: BTreeMap<ResourceId, Resource> = BTreeMap::new();

        for declaration in self.declarations.iter().cloned() {
            let resource = declaration.freeze(&context.default_namespace);
            let id = resource.id().clone();
            if resources.contains_key(&id) {
                return Err(ManifoldError::DuplicateName {
                    kind: id.kind,
                    namespace: id.namespace,
                    name: id.name,
                });
            }
            resources.insert(id, resource);
        }

        check_group_ownership(&resources)?;

        tracing::debug!(resources = resources.len(), "graph snapshot taken");
        Ok(Graph::new(resources))
    }
}

/// Ownership is exclusive: a resource belongs to at most one group.
fn check_group_ownership(resources: &BTreeMap<ResourceId, Resource>) -> ManifoldResult<()> {
    let mut owners: BTreeMap<(String, String), String> = BTreeMap::new();

    for resource in resources.values() {
        let ResourceSpec::ResourceGroup(group) = resource.spec() else {
            continue;
        };
        for member in &group.members {
            let key = (resource.namespace().to_string(), member.clone());
            if let Some(first) = owners.get(&key) {
                return Err(ManifoldError::GroupOwnership {
                    member: member.clone(),
                    first: first.clone(),
                    second: resource.name().to_string(),
                });
            }
            owners.insert(key, resource.name().to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Kind;

    #[test]
    fn snapshot_applies_default_namespace() {
        let context = CompileContext::default().with_default_namespace("staging");
        let graph = GraphBuilder::new()
            .with(Application::named("api").image("registry.example.com/api:1.0"))
            .snapshot(&context)
            .unwrap();

        let id = ResourceId::new(Kind::Application, "staging", "api");
        assert!(graph.get(&id).is_some());
    }

    #[test]
    fn snapshot_detects_duplicates_late() {
        let context = CompileContext::default();
        // Same identity twice; legal to construct, an error to snapshot.
        let builder = GraphBuilder::new()
            .with(Application::named("api").image("a:1"))
            .with(Application::named("api").image("a:2"));

        let err = builder.snapshot(&context).unwrap_err();
        assert!(matches!(err, ManifoldError::DuplicateName { .. }));
    }

    #[test]
    fn same_name_different_kind_is_not_a_duplicate() {
        let context = CompileContext::default();
        let graph = GraphBuilder::new()
            .with(Application::named("db").image("img"))
            .with(Secret::named("db").key("password"))
            .snapshot(&context)
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn snapshots_do_not_cross_contaminate() {
        let context = CompileContext::default();
        let base = GraphBuilder::new().with(Secret::named("shared").key("token"));

        let left = base
            .clone()
            .with(Application::named("left").image("l:1"))
            .snapshot(&context)
            .unwrap();
        let right = base
            .with(Application::named("right").image("r:1"))
            .snapshot(&context)
            .unwrap();

        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 2);
        let left_id = ResourceId::new(Kind::Application, "default", "left");
        assert!(left.get(&left_id).is_some());
        assert!(right.get(&left_id).is_none());
    }

    #[test]
    fn group_ownership_is_exclusive() {
        let context = CompileContext::default();
        let err = GraphBuilder::new()
            .with(Application::named("api").image("img"))
            .with(ResourceGroup::named("stack-a").member("api"))
            .with(ResourceGroup::named("stack-b").member("api"))
            .snapshot(&context)
            .unwrap_err();

        assert!(matches!(err, ManifoldError::GroupOwnership { .. }));
    }

    #[test]
    fn builder_chains_are_value_semantic() {
        let base = Application::named("api").image("img:1");
        let with_port = base.clone().port("http", 8080);
        let plain = base;

        let context = CompileContext::default();
        let graph = GraphBuilder::new().with(with_port).snapshot(&context).unwrap();
        let id = ResourceId::new(Kind::Application, "default", "api");
        let resource = graph.get(&id).unwrap();
        let ResourceSpec::Application(spec) = resource.spec() else {
            panic!("expected application spec");
        };
        assert_eq!(spec.ports.len(), 1);

        // The original chain never saw the port.
        let graph2 = GraphBuilder::new().with(plain).snapshot(&context).unwrap();
        let ResourceSpec::Application(spec2) = graph2.get(&id).unwrap().spec() else {
            panic!("expected application spec");
        };
        assert!(spec2.ports.is_empty());
    }
}
