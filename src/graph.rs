//! Immutable resource graph snapshot
//!
//! Produced by `GraphBuilder::snapshot`; everything downstream (resolver,
//! validation passes, generators) reads this and never writes it. References
//! stay by-name so the graph is serializable and cycle-checkable; resolution
//! happens through lookups here.

use std::collections::BTreeMap;

use crate::models::{Kind, LabelMap, Reference, Resource, ResourceId, ResourceSpec};

/// The frozen snapshot of all resources for one compilation
#[derive(Debug, Clone)]
pub struct Graph {
    resources: BTreeMap<ResourceId, Resource>,
}

impl Graph {
    pub(crate) fn new(resources: BTreeMap<ResourceId, Resource>) -> Self {
        Self { resources }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Resources in identity order (kind rank, then name)
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Identities in identity order
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources.keys()
    }

    /// Resources of one kind, in identity order
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Resource> {
        self.resources.values().filter(move |r| r.kind() == kind)
    }

    /// Every resource named `name` in `namespace`, regardless of kind
    pub fn lookup_named(&self, namespace: &str, name: &str) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| r.namespace() == namespace && r.name() == name)
            .collect()
    }

    /// Resolve a reference from `namespace`: resources whose kind is
    /// compatible with the reference's role and whose name matches.
    pub fn resolve(&self, namespace: &str, reference: &Reference) -> Vec<&Resource> {
        let kinds = reference.role.compatible_kinds();
        self.resources
            .values()
            .filter(|r| {
                r.namespace() == namespace
                    && r.name() == reference.name
                    && kinds.contains(&r.kind())
            })
            .collect()
    }

    /// Workload resources in `namespace` whose labels satisfy `selector`
    pub fn workloads_matching(&self, namespace: &str, selector: &LabelMap) -> Vec<&Resource> {
        self.resources
            .values()
            .filter(|r| {
                r.kind().is_workload()
                    && r.namespace() == namespace
                    && selector
                        .iter()
                        .all(|(k, v)| r.labels().get(k).is_some_and(|have| have == v))
            })
            .collect()
    }

    /// Map from member identity to owning group name
    pub fn group_membership(&self) -> BTreeMap<ResourceId, String> {
        let mut membership = BTreeMap::new();
        for resource in self.resources.values() {
            let ResourceSpec::ResourceGroup(group) = resource.spec() else {
                continue;
            };
            for member in &group.members {
                for found in self.lookup_named(resource.namespace(), member) {
                    if found.kind() != Kind::ResourceGroup {
                        membership.insert(found.id().clone(), resource.name().to_string());
                    }
                }
            }
        }
        membership
    }

    /// The merged ordering edge set as `(prerequisite, dependent)` pairs.
    ///
    /// Sources: explicit `depends_on`, implicit reference relations (mounts,
    /// env-from, connect-to, route backends, role bindings, volume
    /// attachments, group membership), and group-internal dependency maps.
    /// References that do not resolve are skipped here; the reference
    /// validation pass reports them as hard errors before generation.
    pub fn ordering_edges(&self) -> Vec<(ResourceId, ResourceId)> {
        let mut edges: Vec<(ResourceId, ResourceId)> = Vec::new();

        for resource in self.resources.values() {
            for reference in resource.references() {
                for referent in self.resolve(resource.namespace(), &reference) {
                    edges.push((referent.id().clone(), resource.id().clone()));
                }
            }

            if let ResourceSpec::ResourceGroup(group) = resource.spec() {
                for (member, after) in &group.dependencies {
                    for prerequisite_name in after {
                        for member_res in self.lookup_named(resource.namespace(), member) {
                            for prereq_res in
                                self.lookup_named(resource.namespace(), prerequisite_name)
                            {
                                edges.push((prereq_res.id().clone(), member_res.id().clone()));
                            }
                        }
                    }
                }
            }
        }

        edges.sort();
        edges.dedup();
        edges
    }
}
