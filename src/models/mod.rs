//! Core data model for Manifold
//!
//! Defines the frozen resource graph vocabulary:
//! - `Kind`: the twelve declarable resource kinds
//! - `ResourceId`: the `(kind, namespace, name)` identity of a resource
//! - `ReferenceRole` / `Reference`: capability-tagged by-name relations
//! - `Resource` / `ResourceSpec`: an immutable snapshot of one declaration
//!
//! Builders (see `builder`) accumulate these values; nothing downstream of
//! `GraphBuilder::snapshot` mutates them.

pub mod support;
pub mod workload;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use support::{
    AccessBindingSpec, AccessMode, AccessRoleSpec, ConfigDataSpec, ExposureKind, ExternalRouteSpec,
    Grant, GroupSpec, NetworkServiceSpec, SecretSpec, Subject, SubjectKind, TlsSpec, VolumeSpec,
};
pub use workload::{
    AppSpec, BatchJobSpec, ComputeQuantity, ConcurrencyPolicy, ContainerSpec, HealthCheck,
    MountSpec, PortSpec, Protocol, ScheduledJobSpec, StatefulAppSpec, StorageSpec,
    VolumeAttachment,
};

/// String-to-string label/annotation map, ordered for deterministic output
pub type LabelMap = BTreeMap<String, String>;

/// Kind of declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    AccessRole,
    AccessBinding,
    Secret,
    ConfigData,
    Volume,
    StatefulApplication,
    Application,
    NetworkService,
    ExternalRoute,
    BatchJob,
    ScheduledJob,
    ResourceGroup,
}

impl Kind {
    /// Every kind, in deploy-friendly rank order
    pub const ALL: [Kind; 12] = [
        Kind::AccessRole,
        Kind::AccessBinding,
        Kind::Secret,
        Kind::ConfigData,
        Kind::Volume,
        Kind::StatefulApplication,
        Kind::Application,
        Kind::NetworkService,
        Kind::ExternalRoute,
        Kind::BatchJob,
        Kind::ScheduledJob,
        Kind::ResourceGroup,
    ];

    /// Fixed rank used as the secondary ordering key by the resolver.
    ///
    /// Supporting kinds (access control, secrets, config, storage) rank
    /// before workloads, which rank before network exposure and jobs.
    pub fn rank(&self) -> u8 {
        match self {
            Kind::AccessRole => 0,
            Kind::AccessBinding => 1,
            Kind::Secret => 2,
            Kind::ConfigData => 3,
            Kind::Volume => 4,
            Kind::StatefulApplication => 5,
            Kind::Application => 6,
            Kind::NetworkService => 7,
            Kind::ExternalRoute => 8,
            Kind::BatchJob => 9,
            Kind::ScheduledJob => 10,
            Kind::ResourceGroup => 11,
        }
    }

    /// Kebab-case label, used in file names and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Kind::AccessRole => "access-role",
            Kind::AccessBinding => "access-binding",
            Kind::Secret => "secret",
            Kind::ConfigData => "config-data",
            Kind::Volume => "volume",
            Kind::StatefulApplication => "stateful-application",
            Kind::Application => "application",
            Kind::NetworkService => "network-service",
            Kind::ExternalRoute => "external-route",
            Kind::BatchJob => "batch-job",
            Kind::ScheduledJob => "scheduled-job",
            Kind::ResourceGroup => "resource-group",
        }
    }

    /// True for kinds that run container workloads
    pub fn is_workload(&self) -> bool {
        matches!(
            self,
            Kind::Application | Kind::StatefulApplication | Kind::BatchJob | Kind::ScheduledJob
        )
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identity of a resource within one graph: `(kind, namespace, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// File stem used by per-resource targets: `<namespace>-<kind>-<name>`
    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.namespace, self.kind.label(), self.name)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind.label(), self.name)
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.kind
            .rank()
            .cmp(&other.kind.rank())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.namespace.cmp(&other.namespace))
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Role a by-name reference plays for the referencing resource.
///
/// Each role constrains the kind of the referent; the reference validation
/// pass checks role compatibility, not just name existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceRole {
    /// Mount a secret's keys as files
    MountSecret,
    /// Mount config entries as files
    MountConfig,
    /// Inject a secret's keys as environment variables
    EnvFromSecret,
    /// Inject config entries as environment variables
    EnvFromConfig,
    /// Attach a declared volume
    AttachVolume,
    /// Network dependency on a service or workload
    ConnectTo,
    /// Route traffic to a backing service
    RouteBackend,
    /// Bind subjects to an access role
    BindRole,
    /// Explicit ordering dependency
    DependsOn,
    /// Group ownership of a member resource
    GroupMember,
}

impl ReferenceRole {
    /// Kinds a referent of this role may have
    pub fn compatible_kinds(&self) -> &'static [Kind] {
        match self {
            ReferenceRole::MountSecret | ReferenceRole::EnvFromSecret => &[Kind::Secret],
            ReferenceRole::MountConfig | ReferenceRole::EnvFromConfig => &[Kind::ConfigData],
            ReferenceRole::AttachVolume => &[Kind::Volume],
            ReferenceRole::ConnectTo => &[
                Kind::NetworkService,
                Kind::Application,
                Kind::StatefulApplication,
            ],
            ReferenceRole::RouteBackend => &[Kind::NetworkService],
            ReferenceRole::BindRole => &[Kind::AccessRole],
            ReferenceRole::DependsOn | ReferenceRole::GroupMember => &Kind::ALL,
        }
    }

    /// Short label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceRole::MountSecret => "mount-secret",
            ReferenceRole::MountConfig => "mount-config",
            ReferenceRole::EnvFromSecret => "env-from-secret",
            ReferenceRole::EnvFromConfig => "env-from-config",
            ReferenceRole::AttachVolume => "attach-volume",
            ReferenceRole::ConnectTo => "connect-to",
            ReferenceRole::RouteBackend => "route-backend",
            ReferenceRole::BindRole => "bind-role",
            ReferenceRole::DependsOn => "depends-on",
            ReferenceRole::GroupMember => "group-member",
        }
    }
}

impl std::fmt::Display for ReferenceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A by-name, non-owning relation to another resource in the same namespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    pub role: ReferenceRole,
    pub name: String,
}

impl Reference {
    pub fn new(role: ReferenceRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
        }
    }
}

/// Kind-specific frozen attribute set
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Application(AppSpec),
    StatefulApplication(StatefulAppSpec),
    Secret(SecretSpec),
    ConfigData(ConfigDataSpec),
    BatchJob(BatchJobSpec),
    ScheduledJob(ScheduledJobSpec),
    NetworkService(NetworkServiceSpec),
    ExternalRoute(ExternalRouteSpec),
    AccessRole(AccessRoleSpec),
    AccessBinding(AccessBindingSpec),
    Volume(VolumeSpec),
    ResourceGroup(GroupSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> Kind {
        match self {
            ResourceSpec::Application(_) => Kind::Application,
            ResourceSpec::StatefulApplication(_) => Kind::StatefulApplication,
            ResourceSpec::Secret(_) => Kind::Secret,
            ResourceSpec::ConfigData(_) => Kind::ConfigData,
            ResourceSpec::BatchJob(_) => Kind::BatchJob,
            ResourceSpec::ScheduledJob(_) => Kind::ScheduledJob,
            ResourceSpec::NetworkService(_) => Kind::NetworkService,
            ResourceSpec::ExternalRoute(_) => Kind::ExternalRoute,
            ResourceSpec::AccessRole(_) => Kind::AccessRole,
            ResourceSpec::AccessBinding(_) => Kind::AccessBinding,
            ResourceSpec::Volume(_) => Kind::Volume,
            ResourceSpec::ResourceGroup(_) => Kind::ResourceGroup,
        }
    }
}

/// An immutable snapshot of one declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: ResourceId,
    labels: LabelMap,
    annotations: LabelMap,
    depends_on: Vec<String>,
    spec: ResourceSpec,
}

impl Resource {
    pub(crate) fn new(
        id: ResourceId,
        labels: LabelMap,
        annotations: LabelMap,
        depends_on: Vec<String>,
        spec: ResourceSpec,
    ) -> Self {
        Self {
            id,
            labels,
            annotations,
            depends_on,
            spec,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> Kind {
        self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn annotations(&self) -> &LabelMap {
        &self.annotations
    }

    /// Explicit ordering dependencies declared with `depends_on`
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    /// Every by-name relation this resource declares, tagged with its role.
    ///
    /// The list is sorted so downstream consumers iterate deterministically.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs: Vec<Reference> = self
            .depends_on
            .iter()
            .map(|name| Reference::new(ReferenceRole::DependsOn, name.clone()))
            .collect();

        match &self.spec {
            ResourceSpec::Application(spec) => spec.collect_references(&mut refs),
            ResourceSpec::StatefulApplication(spec) => spec.workload.collect_references(&mut refs),
            ResourceSpec::BatchJob(spec) => spec.container.collect_references(&mut refs),
            ResourceSpec::ScheduledJob(spec) => spec.job.container.collect_references(&mut refs),
            ResourceSpec::NetworkService(spec) => {
                if let Some(backend) = &spec.backend {
                    refs.push(Reference::new(ReferenceRole::ConnectTo, backend.clone()));
                }
            }
            ResourceSpec::ExternalRoute(spec) => {
                // Empty backend/role names are schema errors, not references.
                if !spec.backend.is_empty() {
                    refs.push(Reference::new(
                        ReferenceRole::RouteBackend,
                        spec.backend.clone(),
                    ));
                }
                if let Some(tls) = &spec.tls {
                    refs.push(Reference::new(
                        ReferenceRole::MountSecret,
                        tls.secret_name.clone(),
                    ));
                }
            }
            ResourceSpec::AccessBinding(spec) => {
                if !spec.role.is_empty() {
                    refs.push(Reference::new(ReferenceRole::BindRole, spec.role.clone()));
                }
            }
            ResourceSpec::ResourceGroup(spec) => {
                for member in &spec.members {
                    refs.push(Reference::new(ReferenceRole::GroupMember, member.clone()));
                }
            }
            ResourceSpec::Secret(_)
            | ResourceSpec::ConfigData(_)
            | ResourceSpec::AccessRole(_)
            | ResourceSpec::Volume(_) => {}
        }

        refs.sort();
        refs.dedup();
        refs
    }
}

/// Check a name against DNS label rules: lowercase alphanumerics and `-`,
/// must start and end alphanumeric, at most 63 characters.
pub fn is_dns_label(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let bytes = name.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes.iter().all(|&b| alnum(b) || b == b'-')
}
