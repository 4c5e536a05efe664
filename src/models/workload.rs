//! Workload specs: applications, stateful applications, and batch kinds
//!
//! The container surface (image, env, mounts, volumes, compute) is shared
//! between all four workload kinds through `ContainerSpec`; the long-running
//! kinds layer replicas/ports/health on top of it via `AppSpec`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Reference, ReferenceRole};

/// Transport protocol for a declared port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// A named port exposed by a workload or service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

/// CPU/memory quantity, in millicores and MiB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeQuantity {
    pub cpu_millis: u32,
    pub memory_mib: u32,
}

/// Persistent storage request for a stateful workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub size_gib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// HTTP health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub port: u16,
    pub period_seconds: u32,
}

/// A secret or config mount: referent name plus mount path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    pub source: String,
    pub mount_path: String,
}

/// Attachment of a declared `Volume` at a mount path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    pub volume: String,
    pub mount_path: String,
}

/// Concurrency policy for scheduled jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    #[default]
    Allow,
    Forbid,
    Replace,
}

/// Container surface shared by every workload kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub env_from_secrets: Vec<String>,
    pub env_from_configs: Vec<String>,
    pub secret_mounts: Vec<MountSpec>,
    pub config_mounts: Vec<MountSpec>,
    pub volumes: Vec<VolumeAttachment>,
    pub requests: Option<ComputeQuantity>,
    pub limits: Option<ComputeQuantity>,
    pub run_as_root: bool,
    pub privileged: bool,
}

impl ContainerSpec {
    /// Append this container's reference edges to `refs`
    pub(crate) fn collect_references(&self, refs: &mut Vec<Reference>) {
        for name in &self.env_from_secrets {
            refs.push(Reference::new(ReferenceRole::EnvFromSecret, name.clone()));
        }
        for name in &self.env_from_configs {
            refs.push(Reference::new(ReferenceRole::EnvFromConfig, name.clone()));
        }
        for mount in &self.secret_mounts {
            refs.push(Reference::new(
                ReferenceRole::MountSecret,
                mount.source.clone(),
            ));
        }
        for mount in &self.config_mounts {
            refs.push(Reference::new(
                ReferenceRole::MountConfig,
                mount.source.clone(),
            ));
        }
        for attachment in &self.volumes {
            refs.push(Reference::new(
                ReferenceRole::AttachVolume,
                attachment.volume.clone(),
            ));
        }
    }
}

/// Frozen spec of an `Application`
#[derive(Debug, Clone, PartialEq)]
pub struct AppSpec {
    pub container: ContainerSpec,
    pub replicas: u32,
    pub ports: Vec<PortSpec>,
    pub connect_to: Vec<String>,
    pub health: Option<HealthCheck>,
}

impl Default for AppSpec {
    fn default() -> Self {
        Self {
            container: ContainerSpec::default(),
            replicas: 1,
            ports: Vec::new(),
            connect_to: Vec::new(),
            health: None,
        }
    }
}

impl AppSpec {
    pub(crate) fn collect_references(&self, refs: &mut Vec<Reference>) {
        self.container.collect_references(refs);
        for name in &self.connect_to {
            refs.push(Reference::new(ReferenceRole::ConnectTo, name.clone()));
        }
    }
}

/// Frozen spec of a `StatefulApplication`: an application plus storage
#[derive(Debug, Clone, PartialEq)]
pub struct StatefulAppSpec {
    pub workload: AppSpec,
    pub storage: StorageSpec,
}

/// Frozen spec of a `BatchJob`
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJobSpec {
    pub container: ContainerSpec,
    pub completions: u32,
    pub parallelism: u32,
    pub retries: u32,
}

impl Default for BatchJobSpec {
    fn default() -> Self {
        Self {
            container: ContainerSpec::default(),
            completions: 1,
            parallelism: 1,
            retries: 0,
        }
    }
}

/// Frozen spec of a `ScheduledJob`: a batch job on a cron schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJobSpec {
    pub job: BatchJobSpec,
    pub schedule: String,
    pub concurrency: ConcurrencyPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_collects_mount_and_env_references() {
        let container = ContainerSpec {
            env_from_secrets: vec!["db-credentials".to_string()],
            config_mounts: vec![MountSpec {
                source: "app-settings".to_string(),
                mount_path: "/etc/app".to_string(),
            }],
            volumes: vec![VolumeAttachment {
                volume: "scratch".to_string(),
                mount_path: "/tmp/scratch".to_string(),
            }],
            ..ContainerSpec::default()
        };

        let mut refs = Vec::new();
        container.collect_references(&mut refs);

        assert!(refs.contains(&Reference::new(ReferenceRole::EnvFromSecret, "db-credentials")));
        assert!(refs.contains(&Reference::new(ReferenceRole::MountConfig, "app-settings")));
        assert!(refs.contains(&Reference::new(ReferenceRole::AttachVolume, "scratch")));
    }

    #[test]
    fn app_spec_defaults_to_one_replica() {
        assert_eq!(AppSpec::default().replicas, 1);
    }

    #[test]
    fn app_spec_collects_connect_to() {
        let spec = AppSpec {
            connect_to: vec!["db".to_string()],
            ..AppSpec::default()
        };
        let mut refs = Vec::new();
        spec.collect_references(&mut refs);
        assert_eq!(refs, vec![Reference::new(ReferenceRole::ConnectTo, "db")]);
    }
}
