//! Schema pass: required fields present and in range, per kind

use crate::context::CompileContext;
use crate::graph::Graph;
use crate::models::{is_dns_label, Resource, ResourceSpec};

use super::Diagnostic;

/// Required-field presence and basic range checks
pub fn schema_pass(graph: &Graph, _context: &CompileContext) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for resource in graph.resources() {
        check_identity(resource, &mut diagnostics);
        match resource.spec() {
            ResourceSpec::Application(spec) => {
                check_image(resource, &spec.container.image, &mut diagnostics);
            }
            ResourceSpec::StatefulApplication(spec) => {
                check_image(resource, &spec.workload.container.image, &mut diagnostics);
                if spec.storage.size_gib == 0 {
                    diagnostics.push(Diagnostic::error(
                        "schema/storage-size",
                        resource,
                        "storage size must be a positive number of GiB",
                    ));
                }
            }
            ResourceSpec::BatchJob(spec) => {
                check_image(resource, &spec.container.image, &mut diagnostics);
            }
            ResourceSpec::ScheduledJob(spec) => {
                check_image(resource, &spec.job.container.image, &mut diagnostics);
                if !is_valid_cron(&spec.schedule) {
                    diagnostics.push(Diagnostic::error(
                        "schema/schedule",
                        resource,
                        format!("'{}' is not a five-field cron expression", spec.schedule),
                    ));
                }
            }
            ResourceSpec::Volume(spec) => {
                if spec.size_gib == 0 {
                    diagnostics.push(Diagnostic::error(
                        "schema/volume-size",
                        resource,
                        "volume size must be a positive number of GiB",
                    ));
                }
            }
            ResourceSpec::NetworkService(spec) => {
                if spec.selector.is_empty() && spec.backend.is_none() {
                    diagnostics.push(Diagnostic::error(
                        "schema/service-backend",
                        resource,
                        "a network service needs a selector or a backend",
                    ));
                }
            }
            ResourceSpec::ExternalRoute(spec) => {
                if spec.host.trim().is_empty() {
                    diagnostics.push(Diagnostic::error(
                        "schema/route-host",
                        resource,
                        "an external route needs a host",
                    ));
                }
                if spec.backend.trim().is_empty() {
                    diagnostics.push(Diagnostic::error(
                        "schema/route-backend",
                        resource,
                        "an external route needs a backing service",
                    ));
                }
            }
            ResourceSpec::AccessBinding(spec) => {
                if spec.role.trim().is_empty() {
                    diagnostics.push(Diagnostic::error(
                        "schema/binding-role",
                        resource,
                        "an access binding needs a role",
                    ));
                }
                if spec.subjects.is_empty() {
                    diagnostics.push(Diagnostic::error(
                        "schema/binding-subjects",
                        resource,
                        "an access binding needs at least one subject",
                    ));
                }
            }
            ResourceSpec::ResourceGroup(spec) => {
                for (member, after) in &spec.dependencies {
                    for name in std::iter::once(member).chain(after.iter()) {
                        if !spec.members.contains(name) {
                            diagnostics.push(Diagnostic::error(
                                "schema/group-map",
                                resource,
                                format!(
                                    "dependency map names '{name}', which is not a group member"
                                ),
                            ));
                        }
                    }
                }
            }
            ResourceSpec::Secret(_) | ResourceSpec::ConfigData(_) | ResourceSpec::AccessRole(_) => {}
        }
    }

    diagnostics
}

fn check_identity(resource: &Resource, diagnostics: &mut Vec<Diagnostic>) {
    if !is_dns_label(resource.name()) {
        diagnostics.push(Diagnostic::error(
            "schema/name",
            resource,
            format!("'{}' is not a DNS-label-safe name", resource.name()),
        ));
    }
    if !is_dns_label(resource.namespace()) {
        diagnostics.push(Diagnostic::error(
            "schema/namespace",
            resource,
            format!("'{}' is not a DNS-label-safe namespace", resource.namespace()),
        ));
    }
}

fn check_image(resource: &Resource, image: &str, diagnostics: &mut Vec<Diagnostic>) {
    if image.trim().is_empty() {
        diagnostics.push(Diagnostic::error(
            "schema/image",
            resource,
            "a workload needs a container image",
        ));
    }
}

/// Validate a five-field cron expression.
///
/// Each field accepts `*`, `*/step`, or a comma list of values and
/// `lo-hi` ranges, bounded per field (minute 0-59, hour 0-23, day 1-31,
/// month 1-12, weekday 0-6).
pub fn is_valid_cron(expression: &str) -> bool {
    const BOUNDS: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 6)];

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return false;
    }
    fields
        .iter()
        .zip(BOUNDS)
        .all(|(field, (lo, hi))| is_valid_cron_field(field, lo, hi))
}

fn is_valid_cron_field(field: &str, lo: u32, hi: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        return step.parse::<u32>().is_ok_and(|n| n > 0);
    }
    if field.is_empty() {
        return false;
    }
    field.split(',').all(|item| {
        let in_range = |s: &str| s.parse::<u32>().is_ok_and(|n| n >= lo && n <= hi);
        match item.split_once('-') {
            Some((start, end)) => {
                in_range(start)
                    && in_range(end)
                    && start.parse::<u32>().unwrap_or(0) <= end.parse::<u32>().unwrap_or(0)
            }
            None => in_range(item),
        }
    })
}
