//! Builders for the workload kinds

use super::{common_methods, DeclMeta};
use crate::models::workload::{
    AppSpec, BatchJobSpec, ComputeQuantity, ConcurrencyPolicy, HealthCheck, MountSpec, PortSpec,
    Protocol, ScheduledJobSpec, StatefulAppSpec, StorageSpec, VolumeAttachment,
};
use crate::models::ResourceSpec;

/// Implements the container-surface methods shared by every workload
/// builder; `$path` is the field path to the `ContainerSpec`.
macro_rules! container_methods {
    ($($path:ident).+) => {
        /// Set the container image (required)
        pub fn image(mut self, image: impl Into<String>) -> Self {
            self.$($path).+.image = image.into();
            self
        }

        /// Replace the container command
        pub fn command<I, S>(mut self, command: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.$($path).+.command = command.into_iter().map(Into::into).collect();
            self
        }

        /// Set a literal environment variable
        pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.$($path).+.env.insert(key.into(), value.into());
            self
        }

        /// Inject every key of a secret as environment variables
        pub fn env_from_secret(mut self, secret: impl Into<String>) -> Self {
            self.$($path).+.env_from_secrets.push(secret.into());
            self
        }

        /// Inject every entry of a config map as environment variables
        pub fn env_from_config(mut self, config: impl Into<String>) -> Self {
            self.$($path).+.env_from_configs.push(config.into());
            self
        }

        /// Mount a secret's keys as files under `mount_path`
        pub fn mount_secret(
            mut self,
            secret: impl Into<String>,
            mount_path: impl Into<String>,
        ) -> Self {
            self.$($path).+.secret_mounts.push(MountSpec {
                source: secret.into(),
                mount_path: mount_path.into(),
            });
            self
        }

        /// Mount config entries as files under `mount_path`
        pub fn mount_config(
            mut self,
            config: impl Into<String>,
            mount_path: impl Into<String>,
        ) -> Self {
            self.$($path).+.config_mounts.push(MountSpec {
                source: config.into(),
                mount_path: mount_path.into(),
            });
            self
        }

        /// Attach a declared volume at `mount_path`
        pub fn attach_volume(
            mut self,
            volume: impl Into<String>,
            mount_path: impl Into<String>,
        ) -> Self {
            self.$($path).+.volumes.push(VolumeAttachment {
                volume: volume.into(),
                mount_path: mount_path.into(),
            });
            self
        }

        /// Set requested compute
        pub fn request(mut self, cpu_millis: u32, memory_mib: u32) -> Self {
            self.$($path).+.requests = Some(ComputeQuantity {
                cpu_millis,
                memory_mib,
            });
            self
        }

        /// Set compute limits
        pub fn limit(mut self, cpu_millis: u32, memory_mib: u32) -> Self {
            self.$($path).+.limits = Some(ComputeQuantity {
                cpu_millis,
                memory_mib,
            });
            self
        }

        /// Run the container as root (flagged by the security pass unless
        /// the context allows it)
        pub fn run_as_root(mut self) -> Self {
            self.$($path).+.run_as_root = true;
            self
        }

        /// Run the container privileged (flagged by the security pass unless
        /// the context allows it)
        pub fn privileged(mut self) -> Self {
            self.$($path).+.privileged = true;
            self
        }
    };
}

/// Implements the long-running service surface; `$path` is the field path to
/// the `AppSpec`.
macro_rules! service_methods {
    ($($path:ident).+) => {
        /// Set the replica count (last call wins)
        pub fn replicas(mut self, replicas: u32) -> Self {
            self.$($path).+.replicas = replicas;
            self
        }

        /// Expose a named TCP port (appends)
        pub fn port(mut self, name: impl Into<String>, port: u16) -> Self {
            self.$($path).+.ports.push(PortSpec {
                name: name.into(),
                port,
                protocol: Protocol::Tcp,
            });
            self
        }

        /// Expose a named UDP port (appends)
        pub fn udp_port(mut self, name: impl Into<String>, port: u16) -> Self {
            self.$($path).+.ports.push(PortSpec {
                name: name.into(),
                port,
                protocol: Protocol::Udp,
            });
            self
        }

        /// Declare a network dependency on a service or workload
        pub fn connect_to(mut self, name: impl Into<String>) -> Self {
            self.$($path).+.connect_to.push(name.into());
            self
        }

        /// Configure an HTTP health probe
        pub fn health_check(
            mut self,
            path: impl Into<String>,
            port: u16,
            period_seconds: u32,
        ) -> Self {
            self.$($path).+.health = Some(HealthCheck {
                path: path.into(),
                port,
                period_seconds,
            });
            self
        }
    };
}

/// Builder for a stateless long-running application
#[derive(Debug, Clone)]
pub struct Application {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: AppSpec,
}

impl Application {
    /// Start declaring an application
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: AppSpec::default(),
        }
    }

    common_methods!();
    container_methods!(spec.container);
    service_methods!(spec);

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::Application(self.spec))
    }
}

/// Builder for a stateful application with persistent storage
#[derive(Debug, Clone)]
pub struct StatefulApplication {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: StatefulAppSpec,
}

impl StatefulApplication {
    /// Start declaring a stateful application
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: StatefulAppSpec {
                workload: AppSpec::default(),
                storage: StorageSpec {
                    size_gib: 0,
                    class: None,
                },
            },
        }
    }

    common_methods!();
    container_methods!(spec.workload.container);
    service_methods!(spec.workload);

    /// Request persistent storage of `size_gib` GiB (required, must be > 0)
    pub fn storage(mut self, size_gib: u32) -> Self {
        self.spec.storage.size_gib = size_gib;
        self
    }

    /// Set the storage class
    pub fn storage_class(mut self, class: impl Into<String>) -> Self {
        self.spec.storage.class = Some(class.into());
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::StatefulApplication(self.spec))
    }
}

/// Builder for a run-to-completion batch job
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: BatchJobSpec,
}

impl BatchJob {
    /// Start declaring a batch job
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: BatchJobSpec::default(),
        }
    }

    common_methods!();
    container_methods!(spec.container);

    /// Number of completions required (last call wins)
    pub fn completions(mut self, completions: u32) -> Self {
        self.spec.completions = completions;
        self
    }

    /// How many pods may run in parallel (last call wins)
    pub fn parallelism(mut self, parallelism: u32) -> Self {
        self.spec.parallelism = parallelism;
        self
    }

    /// Retry budget before the job is marked failed
    pub fn retries(mut self, retries: u32) -> Self {
        self.spec.retries = retries;
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::BatchJob(self.spec))
    }
}

/// Builder for a batch job on a cron schedule
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub(crate) meta: DeclMeta,
    pub(crate) spec: ScheduledJobSpec,
}

impl ScheduledJob {
    /// Start declaring a scheduled job
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            meta: DeclMeta::named(name),
            spec: ScheduledJobSpec {
                job: BatchJobSpec::default(),
                schedule: String::new(),
                concurrency: ConcurrencyPolicy::default(),
            },
        }
    }

    common_methods!();
    container_methods!(spec.job.container);

    /// Five-field cron schedule, e.g. `"0 3 * * *"` (required)
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.spec.schedule = schedule.into();
        self
    }

    /// What happens when a run overlaps the previous one
    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.spec.concurrency = policy;
        self
    }

    /// Number of completions required (last call wins)
    pub fn completions(mut self, completions: u32) -> Self {
        self.spec.job.completions = completions;
        self
    }

    /// How many pods may run in parallel (last call wins)
    pub fn parallelism(mut self, parallelism: u32) -> Self {
        self.spec.job.parallelism = parallelism;
        self
    }

    /// Retry budget before a run is marked failed
    pub fn retries(mut self, retries: u32) -> Self {
        self.spec.job.retries = retries;
        self
    }

    pub(crate) fn into_parts(self) -> (DeclMeta, ResourceSpec) {
        (self.meta, ResourceSpec::ScheduledJob(self.spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workload::Protocol;

    #[test]
    fn application_list_attributes_append() {
        let app = Application::named("api")
            .image("img:1")
            .port("http", 8080)
            .udp_port("metrics", 9090)
            .env_from_secret("a")
            .env_from_secret("b");

        assert_eq!(app.spec.ports.len(), 2);
        assert_eq!(app.spec.ports[1].protocol, Protocol::Udp);
        assert_eq!(app.spec.container.env_from_secrets, vec!["a", "b"]);
    }

    #[test]
    fn application_scalar_attributes_last_call_wins() {
        let app = Application::named("api").image("img:1").image("img:2").replicas(3).replicas(5);
        assert_eq!(app.spec.container.image, "img:2");
        assert_eq!(app.spec.replicas, 5);
    }

    #[test]
    fn stateful_application_storage() {
        let db = StatefulApplication::named("db")
            .image("postgres:16")
            .storage(10)
            .storage_class("fast-ssd");
        assert_eq!(db.spec.storage.size_gib, 10);
        assert_eq!(db.spec.storage.class.as_deref(), Some("fast-ssd"));
    }

    #[test]
    fn scheduled_job_schedule_and_policy() {
        let job = ScheduledJob::named("backup")
            .image("backup:1")
            .schedule("0 3 * * *")
            .concurrency(ConcurrencyPolicy::Forbid)
            .retries(2);
        assert_eq!(job.spec.schedule, "0 3 * * *");
        assert_eq!(job.spec.concurrency, ConcurrencyPolicy::Forbid);
        assert_eq!(job.spec.job.retries, 2);
    }
}
