//! Supporting kinds: secrets, config, storage, networking, access control,
//! and resource groups

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::LabelMap;

/// Frozen spec of a `Secret`: key names only, never values.
///
/// Secret material stays outside the graph; the compiler only arranges
/// references and mount semantics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecretSpec {
    pub keys: Vec<String>,
    pub external_source: Option<String>,
}

/// Frozen spec of a `ConfigData` map
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDataSpec {
    pub entries: BTreeMap<String, String>,
}

/// How a `NetworkService` is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureKind {
    #[default]
    ClusterInternal,
    Node,
    LoadBalancer,
}

/// Frozen spec of a `NetworkService`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkServiceSpec {
    /// Label selector over workloads; empty selector plus no backend is a
    /// schema error
    pub selector: LabelMap,
    /// Direct backend workload reference, as an alternative to a selector
    pub backend: Option<String>,
    pub ports: Vec<super::PortSpec>,
    pub exposure: ExposureKind,
}

/// TLS declaration on an external route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSpec {
    pub secret_name: String,
}

/// Frozen spec of an `ExternalRoute`
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRouteSpec {
    pub host: String,
    pub path_prefix: String,
    pub backend: String,
    pub tls: Option<TlsSpec>,
    pub public: bool,
}

/// One grant inside an `AccessRole`: actions over object types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub actions: Vec<String>,
    pub objects: Vec<String>,
}

/// Frozen spec of an `AccessRole`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccessRoleSpec {
    pub grants: Vec<Grant>,
}

/// Kind of subject an `AccessBinding` grants to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Group,
    Workload,
}

/// A subject of an `AccessBinding`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
}

/// Frozen spec of an `AccessBinding`
#[derive(Debug, Clone, PartialEq)]
pub struct AccessBindingSpec {
    pub role: String,
    pub subjects: Vec<Subject>,
}

/// Access mode of a declared `Volume`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    #[default]
    SingleWriter,
    MultiReader,
    MultiWriter,
}

/// Frozen spec of a `Volume`
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub size_gib: u32,
    pub class: Option<String>,
    pub access_mode: AccessMode,
}

/// Frozen spec of a `ResourceGroup`: owned members plus an internal
/// dependency map restricted to those members
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupSpec {
    pub members: Vec<String>,
    pub dependencies: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_spec_holds_key_names_only() {
        let spec = SecretSpec {
            keys: vec!["password".to_string(), "username".to_string()],
            external_source: Some("vault".to_string()),
        };
        assert_eq!(spec.keys.len(), 2);
    }

    #[test]
    fn exposure_kind_serde_kebab_case() {
        let kind: ExposureKind = serde_yaml_ng::from_str("load-balancer").unwrap();
        assert_eq!(kind, ExposureKind::LoadBalancer);
    }

    #[test]
    fn subject_kind_serde_lowercase() {
        let kind: SubjectKind = serde_yaml_ng::from_str("workload").unwrap();
        assert_eq!(kind, SubjectKind::Workload);
    }
}
