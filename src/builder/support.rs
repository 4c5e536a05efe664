//! Builders for the supporting kinds

use super::{common_methods, DeclMeta};
use crate::models::support::{
    AccessBindingSpec, AccessMode, AccessRoleSpec, ConfigDataSpec, ExposureKind,
    ExternalRouteSpec, Grant, GroupSpec, NetworkServiceSpec, SecretSpec, Subject, SubjectKind,
    TlsSpec, VolumeSpec,
};
use crate::models::workload::{PortSpec, Protocol};
use crate::models::ResourceSpec;

/// Builder for a secret (key names only, never values)
#[derive(Debug, Clone)]
pub struct Secret {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: SecretSpec,
}

impl Secret {
    /// Start declaring a secret
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: SecretSpec::default(),
        }
    }

    common_methods!();

    /// Declare a key this secret carries (appends)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.spec.keys.push(key.into());
        self
    }

    /// Mark the secret as sourced from an external store
    pub fn external_source(mut self, source: impl Into<String>) -> Self {
        self.spec.external_source = Some(source.into());
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::Secret(self.spec))
    }
}

/// Builder for a plain configuration map
#[derive(Debug, Clone)]
pub struct ConfigData {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: ConfigDataSpec,
}

impl ConfigData {
    /// Start declaring a config map
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: ConfigDataSpec::default(),
        }
    }

    common_methods!();

    /// Set one configuration entry (last call per key wins)
    pub fn entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.entries.insert(key.into(), value.into());
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::ConfigData(self.spec))
    }
}

/// Builder for a persistent volume
#[derive(Debug, Clone)]
pub struct Volume {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: VolumeSpec,
}

impl Volume {
    /// Start declaring a volume
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: VolumeSpec {
                size_gib: 0,
                class: None,
                access_mode: AccessMode::default(),
            },
        }
    }

    common_methods!();

    /// Requested size in GiB (required, must be > 0)
    pub fn size_gib(mut self, size_gib: u32) -> Self {
        self.spec.size_gib = size_gib;
        self
    }

    /// Set the storage class
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.spec.class = Some(class.into());
        self
    }

    /// Set the access mode
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.spec.access_mode = mode;
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::Volume(self.spec))
    }
}

/// Builder for an in-cluster network service
#[derive(Debug, Clone)]
pub struct NetworkService {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: NetworkServiceSpec,
}

impl NetworkService {
    /// Start declaring a network service
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: NetworkServiceSpec::default(),
        }
    }

    common_methods!();

    /// Select backing workloads by label (appends to the selector)
    pub fn selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.selector.insert(key.into(), value.into());
        self
    }

    /// Route to one named workload instead of a label selector
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.spec.backend = Some(name.into());
        self
    }

    /// Expose a named TCP port (appends)
    pub fn port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.spec.ports.push(PortSpec {
            name: name.into(),
            port,
            protocol: Protocol::Tcp,
        });
        self
    }

    /// Set how the service is exposed
    pub fn exposure(mut self, exposure: ExposureKind) -> Self {
        self.spec.exposure = exposure;
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::NetworkService(self.spec))
    }
}

/// Builder for a route from outside the cluster to a service
#[derive(Debug, Clone)]
pub struct ExternalRoute {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: ExternalRouteSpec,
}

impl ExternalRoute {
    /// Start declaring an external route
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: ExternalRouteSpec {
                host: String::new(),
                path_prefix: "/".to_string(),
                backend: String::new(),
                tls: None,
                public: false,
            },
        }
    }

    common_methods!();

    /// Hostname the route answers on (required)
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.spec.host = host.into();
        self
    }

    /// Path prefix to match (defaults to `/`)
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.spec.path_prefix = prefix.into();
        self
    }

    /// Backing network service (required)
    pub fn backend(mut self, service: impl Into<String>) -> Self {
        self.spec.backend = service.into();
        self
    }

    /// Terminate TLS with the certificate held in `secret`
    pub fn tls(mut self, secret: impl Into<String>) -> Self {
        self.spec.tls = Some(TlsSpec {
            secret_name: secret.into(),
        });
        self
    }

    /// Expose the route to the public internet
    pub fn public(mut self) -> Self {
        self.spec.public = true;
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::ExternalRoute(self.spec))
    }
}

/// Builder for an access-control role
#[derive(Debug, Clone)]
pub struct AccessRole {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: AccessRoleSpec,
}

impl AccessRole {
    /// Start declaring an access role
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: AccessRoleSpec::default(),
        }
    }

    common_methods!();

    /// Grant `actions` over `objects` (appends)
    pub fn grant<A, O, S, T>(mut self, actions: A, objects: O) -> Self
    where
        A: IntoIterator<Item = S>,
        O: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.spec.grants.push(Grant {
            actions: actions.into_iter().map(Into::into).collect(),
            objects: objects.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::AccessRole(self.spec))
    }
}

/// Builder for a binding of subjects to an access role
#[derive(Debug, Clone)]
pub struct AccessBinding {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: AccessBindingSpec,
}

impl AccessBinding {
    /// Start declaring an access binding
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: AccessBindingSpec {
                role: String::new(),
                subjects: Vec::new(),
            },
        }
    }

    common_methods!();

    /// Role this binding grants (required)
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.spec.role = role.into();
        self
    }

    /// Add a subject (appends)
    pub fn subject(mut self, kind: SubjectKind, name: impl Into<String>) -> Self {
        self.spec.subjects.push(Subject {
            kind,
            name: name.into(),
        });
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::AccessBinding(self.spec))
    }
}

/// Builder for a group that owns member resources and orders them
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: GroupSpec,
}

impl ResourceGroup {
    /// Start declaring a resource group
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: GroupSpec::default(),
        }
    }

    common_methods!();

    /// Claim a member resource (appends; ownership is exclusive)
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.spec.members.push(name.into());
        self
    }

    /// Order members inside the group: `member` deploys after `after`
    pub fn member_depends_on(
        mut self,
        member: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        self.spec
            .dependencies
            .entry(member.into())
            .or_default()
            .push(after.into());
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::ResourceGroup(self.spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_keys_append() {
        let secret = Secret::named("db-credentials").key("username").key("password");
        assert_eq!(secret.spec.keys, vec!["username", "password"]);
    }

    #[test]
    fn network_service_selector_and_backend() {
        let svc = NetworkService::named("api-svc")
            .selector("app", "api")
            .backend("api")
            .port("http", 80)
            .exposure(ExposureKind::LoadBalancer);
        assert_eq!(svc.spec.selector["app"], "api");
        assert_eq!(svc.spec.backend.as_deref(), Some("api"));
        assert_eq!(svc.spec.exposure, ExposureKind::LoadBalancer);
    }

    #[test]
    fn route_defaults_to_root_prefix_and_private() {
        let route = ExternalRoute::named("api-route").host("api.example.com").backend("api-svc");
        assert_eq!(route.spec.path_prefix, "/");
        assert!(!route.spec.public);
        assert!(route.spec.tls.is_none());
    }

    #[test]
    fn access_role_grants() {
        let role = AccessRole::named("reader").grant(["get", "list"], ["secrets"]);
        assert_eq!(role.spec.grants.len(), 1);
        assert_eq!(role.spec.grants[0].actions, vec!["get", "list"]);
    }

    #[test]
    fn group_dependency_map_appends() {
        let group = ResourceGroup::named("stack")
            .member("db")
            .member("api")
            .member_depends_on("api", "db");
        assert_eq!(group.spec.dependencies["api"], vec!["db"]);
    }
}
