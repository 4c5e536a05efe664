//! Target value object - defines which output format to compile for

use serde::{Deserialize, Serialize};

/// Target format for compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Kubernetes-style manifest documents, one per resource
    Manifest,
    /// Container-orchestration compose file (single aggregate document)
    Compose,
    /// Templated package skeleton (values file + per-kind templates)
    Package,
    /// Overlay/patch documents plus an aggregate index
    Overlay,
    /// Infrastructure-as-code resource blocks (JSON)
    Infra,
    /// All formats (meta-target, expands to all specific targets)
    All,
}

impl Target {
    /// All concrete targets (excluding `All`)
    pub const ALL_CONCRETE: [Target; 5] = [
        Target::Manifest,
        Target::Compose,
        Target::Package,
        Target::Overlay,
        Target::Infra,
    ];

    /// Returns true if this is the `All` meta-target
    pub fn is_all(&self) -> bool {
        matches!(self, Target::All)
    }

    /// Expand `All` to concrete targets, or return self if already concrete
    pub fn expand(&self) -> Vec<Target> {
        if self.is_all() {
            Self::ALL_CONCRETE.to_vec()
        } else {
            vec![*self]
        }
    }

    /// Expand a requested target set into a deduplicated, ordered concrete set.
    ///
    /// An empty request means all targets, matching the `All` meta-target.
    pub fn expand_all(requested: &[Target]) -> Vec<Target> {
        if requested.is_empty() || requested.contains(&Target::All) {
            return Self::ALL_CONCRETE.to_vec();
        }
        let mut out: Vec<Target> = Vec::new();
        for target in Self::ALL_CONCRETE {
            if requested.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    /// Get the output subdirectory name for this target
    pub fn directory_name(&self) -> &'static str {
        match self {
            Target::Manifest => "manifest",
            Target::Compose => "compose",
            Target::Package => "package",
            Target::Overlay => "overlay",
            Target::Infra => "infra",
            Target::All => "all", // Should not be used directly
        }
    }

    /// File extension for per-resource documents of this target
    pub fn extension(&self) -> &'static str {
        match self {
            Target::Infra => "json",
            _ => "yaml",
        }
    }

    /// Get a human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Target::Manifest => "manifest",
            Target::Compose => "compose",
            Target::Package => "package",
            Target::Overlay => "overlay",
            Target::Infra => "infra",
            Target::All => "all",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_all_concrete_has_5_targets() {
        assert_eq!(Target::ALL_CONCRETE.len(), 5);
    }

    #[test]
    fn target_is_all() {
        assert!(Target::All.is_all());
        assert!(!Target::Manifest.is_all());
    }

    #[test]
    fn target_expand_all_meta() {
        assert_eq!(Target::All.expand(), Target::ALL_CONCRETE.to_vec());
        assert_eq!(Target::Compose.expand(), vec![Target::Compose]);
    }

    #[test]
    fn expand_all_empty_means_all() {
        assert_eq!(Target::expand_all(&[]), Target::ALL_CONCRETE.to_vec());
    }

    #[test]
    fn expand_all_dedupes_and_orders() {
        let requested = [Target::Infra, Target::Manifest, Target::Infra];
        assert_eq!(
            Target::expand_all(&requested),
            vec![Target::Manifest, Target::Infra]
        );
    }

    #[test]
    fn target_serde_kebab_case() {
        let target: Target = serde_yaml_ng::from_str("manifest").unwrap();
        assert_eq!(target, Target::Manifest);
        let target: Target = serde_yaml_ng::from_str("infra").unwrap();
        assert_eq!(target, Target::Infra);
    }

    #[test]
    fn directory_and_extension() {
        assert_eq!(Target::Manifest.directory_name(), "manifest");
        assert_eq!(Target::Manifest.extension(), "yaml");
        assert_eq!(Target::Infra.extension(), "json");
    }
}
