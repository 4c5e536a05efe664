//! Compilation context
//!
//! An explicit configuration object threaded through `compile` instead of
//! ambient global state: default namespace, security mode, per-namespace
//! quotas, and generator options. Loadable from TOML with unknown-key
//! warnings and `MANIFOLD_*` environment overrides.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ManifoldError, ManifoldResult};

/// How strictly the security pass treats its findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Security findings are warnings
    #[default]
    Balanced,
    /// Security findings are errors and abort compilation
    Strict,
}

/// Compute quota for one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NamespaceQuota {
    #[serde(default)]
    pub cpu_millis: Option<u32>,
    #[serde(default)]
    pub memory_mib: Option<u32>,
    #[serde(default)]
    pub max_replicas: Option<u32>,
}

/// Non-fatal warning surfaced while loading a context file (e.g. unknown keys)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

/// Configuration context for one compilation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileContext {
    /// Namespace applied to resources that did not declare one
    pub default_namespace: String,
    /// Severity escalation for the security pass
    pub security_mode: SecurityMode,
    /// Resource names explicitly allowed to run privileged or as root
    pub allow_privileged: Vec<String>,
    /// Per-namespace compute quotas checked by the bounds pass
    pub quotas: BTreeMap<String, NamespaceQuota>,
    /// Replica/parallelism values above this are flagged as unbounded
    pub replica_ceiling: u32,
    /// Name stamped into the package target's metadata file
    pub package_name: String,
    /// Opt-in generation timestamp; `None` keeps output reproducible
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            security_mode: SecurityMode::Balanced,
            allow_privileged: Vec::new(),
            quotas: BTreeMap::new(),
            replica_ceiling: 64,
            package_name: "app".to_string(),
            timestamp: None,
        }
    }
}

impl CompileContext {
    /// Set the default namespace
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Set the security mode
    pub fn with_security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    /// Allow a named resource to run privileged or as root
    pub fn allow_privileged(mut self, name: impl Into<String>) -> Self {
        self.allow_privileged.push(name.into());
        self
    }

    /// Set the quota for a namespace
    pub fn with_quota(mut self, namespace: impl Into<String>, quota: NamespaceQuota) -> Self {
        self.quotas.insert(namespace.into(), quota);
        self
    }

    /// Request a generation timestamp in the artifacts.
    ///
    /// Off by default so repeated compilations are byte-identical.
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Is this resource name on the privileged allow list?
    pub fn is_privilege_allowed(&self, name: &str) -> bool {
        self.allow_privileged.iter().any(|n| n == name)
    }

    /// Load a context from a TOML file, collecting non-fatal warnings for
    /// unknown keys.
    pub fn load(path: &Path) -> ManifoldResult<(Self, Vec<ContextWarning>)> {
        let content = fs::read_to_string(path)?;

        let mut unknown_paths: Vec<String> = Vec::new();
        let deserializer = toml::de::Deserializer::new(&content);

        let context: CompileContext = serde_ignored::deserialize(deserializer, |p| {
            unknown_paths.push(p.to_string());
        })
        .map_err(|e| ManifoldError::Context {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let warnings = unknown_paths
            .into_iter()
            .map(|path_str| {
                let key = path_str
                    .split('.')
                    .next_back()
                    .unwrap_or(path_str.as_str())
                    .to_string();
                ContextWarning {
                    key: key.clone(),
                    file: path.to_path_buf(),
                    line: find_line_number(&content, &key),
                    suggestion: suggest_key(&key),
                }
            })
            .collect();

        Ok((with_env_overrides(context), warnings))
    }

    /// Load from a file if it exists, otherwise defaults; env overrides apply
    /// either way.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            if path.exists() {
                if let Ok((context, _)) = Self::load(path) {
                    return context;
                }
            }
        }
        with_env_overrides(Self::default())
    }
}

/// Apply environment variable overrides (MANIFOLD_* prefix)
pub fn with_env_overrides(mut context: CompileContext) -> CompileContext {
    if let Ok(namespace) = std::env::var("MANIFOLD_DEFAULT_NAMESPACE") {
        if !namespace.trim().is_empty() {
            context.default_namespace = namespace.trim().to_string();
        }
    }

    if let Ok(mode) = std::env::var("MANIFOLD_SECURITY_MODE") {
        context.security_mode = match mode.to_lowercase().as_str() {
            "strict" => SecurityMode::Strict,
            _ => SecurityMode::Balanced,
        };
    }

    if let Ok(ceiling) = std::env::var("MANIFOLD_REPLICA_CEILING") {
        if let Ok(parsed) = ceiling.trim().parse::<u32>() {
            context.replica_ceiling = parsed;
        }
    }

    context
}

const KNOWN_KEYS: &[&str] = &[
    "default_namespace",
    "security_mode",
    "allow_privileged",
    "quotas",
    "replica_ceiling",
    "package_name",
    "cpu_millis",
    "memory_mib",
    "max_replicas",
];

/// Suggest the known key most similar to an unknown one
fn suggest_key(key: &str) -> Option<String> {
    let lower = key.to_lowercase().replace('-', "_");
    KNOWN_KEYS
        .iter()
        .find(|known| {
            **known == lower
                || known.starts_with(lower.as_str())
                || lower.starts_with(**known)
        })
        .map(|known| (*known).to_string())
}

/// Find the 1-indexed line where a key first appears
fn find_line_number(content: &str, key: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.trim_start().starts_with(key))
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_context() {
        let context = CompileContext::default();
        assert_eq!(context.default_namespace, "default");
        assert_eq!(context.security_mode, SecurityMode::Balanced);
        assert_eq!(context.replica_ceiling, 64);
        assert!(context.timestamp.is_none());
    }

    #[test]
    fn load_parses_quotas_and_mode() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_namespace = "prod"
security_mode = "strict"

[quotas.prod]
cpu_millis = 4000
memory_mib = 8192
max_replicas = 10
"#
        )
        .unwrap();

        let (context, warnings) = CompileContext::load(file.path()).unwrap();
        assert_eq!(context.default_namespace, "prod");
        assert_eq!(context.security_mode, SecurityMode::Strict);
        assert_eq!(context.quotas["prod"].cpu_millis, Some(4000));
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_warns_on_unknown_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_namespace = "prod"
replica_ceilling = 10
"#
        )
        .unwrap();

        let (context, warnings) = CompileContext::load(file.path()).unwrap();
        assert_eq!(context.default_namespace, "prod");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "replica_ceilling");
        assert_eq!(warnings[0].line, Some(3));
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_namespace = [not toml").unwrap();

        let result = CompileContext::load(file.path());
        assert!(matches!(result, Err(ManifoldError::Context { .. })));
    }

    #[test]
    fn privilege_allow_list() {
        let context = CompileContext::default().allow_privileged("node-agent");
        assert!(context.is_privilege_allowed("node-agent"));
        assert!(!context.is_privilege_allowed("api"));
    }

    #[test]
    fn suggest_key_finds_near_match() {
        assert_eq!(
            suggest_key("replica_ceil").as_deref(),
            Some("replica_ceiling")
        );
        assert_eq!(suggest_key("zzz"), None);
    }
}
