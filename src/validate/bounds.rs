//! Resource-bound pass: requested compute against namespace quotas,
//! unbounded replica and parallelism values
//!
//! All findings here are warnings; quota overruns are advisory, not
//! blocking.

use std::collections::BTreeMap;

use crate::context::CompileContext;
use crate::graph::Graph;
use crate::models::{ComputeQuantity, Resource, ResourceSpec};

use super::Diagnostic;

#[derive(Debug, Default, Clone, Copy)]
struct NamespaceUsage {
    cpu_millis: u64,
    memory_mib: u64,
}

/// Sanity checks on compute quantities and scale-out values
pub fn bounds_pass(graph: &Graph, context: &CompileContext) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut usage: BTreeMap<&str, NamespaceUsage> = BTreeMap::new();

    for resource in graph.resources() {
        let Some((requests, instances)) = requested_compute(resource) else {
            continue;
        };

        check_scale_out(resource, instances, context, &mut diagnostics);

        if let Some(requests) = requests {
            let entry = usage.entry(resource.namespace()).or_default();
            entry.cpu_millis += u64::from(requests.cpu_millis) * u64::from(instances.max(1));
            entry.memory_mib += u64::from(requests.memory_mib) * u64::from(instances.max(1));
        }

        if let Some(quota) = context.quotas.get(resource.namespace()) {
            if let Some(max_replicas) = quota.max_replicas {
                if instances > max_replicas {
                    diagnostics.push(Diagnostic::warning(
                        "bounds/quota-replicas",
                        resource,
                        format!(
                            "{instances} instances exceed the namespace cap of {max_replicas}"
                        ),
                    ));
                }
            }
        }
    }

    for (namespace, used) in usage {
        let Some(quota) = context.quotas.get(namespace) else {
            continue;
        };
        if let Some(cpu) = quota.cpu_millis {
            if used.cpu_millis > u64::from(cpu) {
                diagnostics.push(Diagnostic::graph_warning(
                    "bounds/quota-cpu",
                    format!(
                        "namespace '{namespace}' requests {}m CPU against a quota of {cpu}m",
                        used.cpu_millis
                    ),
                ));
            }
        }
        if let Some(memory) = quota.memory_mib {
            if used.memory_mib > u64::from(memory) {
                diagnostics.push(Diagnostic::graph_warning(
                    "bounds/quota-memory",
                    format!(
                        "namespace '{namespace}' requests {}MiB memory against a quota of {memory}MiB",
                        used.memory_mib
                    ),
                ));
            }
        }
    }

    diagnostics
}

/// Requested per-instance compute and the instance count, for kinds that
/// consume compute
fn requested_compute(resource: &Resource) -> Option<(Option<ComputeQuantity>, u32)> {
    match resource.spec() {
        ResourceSpec::Application(spec) => Some((spec.container.requests, spec.replicas)),
        ResourceSpec::StatefulApplication(spec) => {
            Some((spec.workload.container.requests, spec.workload.replicas))
        }
        ResourceSpec::BatchJob(spec) => Some((spec.container.requests, spec.parallelism)),
        ResourceSpec::ScheduledJob(spec) => Some((spec.job.container.requests, spec.job.parallelism)),
        _ => None,
    }
}

fn check_scale_out(
    resource: &Resource,
    instances: u32,
    context: &CompileContext,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let noun = match resource.spec() {
        ResourceSpec::BatchJob(_) | ResourceSpec::ScheduledJob(_) => "parallelism",
        _ => "replica count",
    };

    if instances == 0 {
        diagnostics.push(Diagnostic::warning(
            "bounds/zero-instances",
            resource,
            format!("{noun} of 0 deploys nothing"),
        ));
    } else if instances > context.replica_ceiling {
        diagnostics.push(Diagnostic::warning(
            "bounds/unbounded",
            resource,
            format!(
                "{noun} of {instances} exceeds the configured ceiling of {}",
                context.replica_ceiling
            ),
        ));
    }
}
