//! Generator registry and per-target renderers
//!
//! A `Generator` is a pure function from the validated graph plus its
//! resolved order to serialized documents for one target format. The
//! registry is explicit: construct it once (usually via `builtin`) and pass
//! it to `compile`, never discover generators through ambient state.
//!
//! Determinism contract: identical graph and order produce byte-identical
//! artifacts. All generators render resources in resolver order, serialize
//! typed documents (struct field order is fixed), and keep maps in
//! `BTreeMap`s. Timestamps appear only when the context asks for them.

mod compose;
mod infra;
mod manifest;
mod overlay;
mod package;

pub use compose::ComposeGenerator;
pub use infra::InfraGenerator;
pub use manifest::ManifestGenerator;
pub use overlay::OverlayGenerator;
pub use package::PackageGenerator;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::CompileContext;
use crate::error::ManifoldResult;
use crate::graph::Graph;
use crate::models::ResourceId;
use crate::target::Target;

/// One serialized output document, tagged with its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    target: Target,
    path: PathBuf,
    content: String,
}

impl Artifact {
    pub fn new(target: Target, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            target,
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Path relative to the output root, including the target subdirectory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A per-target renderer over the validated graph
pub trait Generator {
    fn target(&self) -> Target;

    /// Render the graph into this target's documents.
    ///
    /// Fails with `ManifoldError::Generate` when a resource cannot be
    /// expressed in this target's schema; the caller isolates the failure to
    /// this target.
    fn generate(
        &self,
        graph: &Graph,
        order: &[ResourceId],
        context: &CompileContext,
    ) -> ManifoldResult<Vec<Artifact>>;
}

/// Explicit mapping from target to generator
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<Target, Box<dyn Generator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}

impl GeneratorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with all five built-in generators
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ManifestGenerator));
        registry.register(Box::new(ComposeGenerator));
        registry.register(Box::new(PackageGenerator));
        registry.register(Box::new(OverlayGenerator));
        registry.register(Box::new(InfraGenerator));
        registry
    }

    /// Register a generator under its own target; replaces any previous one
    pub fn register(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.target(), generator);
    }

    pub fn get(&self, target: Target) -> Option<&dyn Generator> {
        self.generators.get(&target).map(|generator| generator.as_ref())
    }

    /// Registered targets, in order
    pub fn targets(&self) -> Vec<Target> {
        self.generators.keys().copied().collect()
    }
}

/// Side table mapping each resource to its position in the deploy order.
///
/// Generators derive ordering data here instead of writing it into
/// resources.
pub(crate) fn order_index(order: &[ResourceId]) -> BTreeMap<&ResourceId, usize> {
    order.iter().enumerate().map(|(idx, id)| (id, idx)).collect()
}

/// Names of this resource's prerequisites, in edge order, deduplicated
pub(crate) fn prerequisite_names(graph: &Graph, id: &ResourceId) -> Vec<String> {
    let mut names: Vec<String> = graph
        .ordering_edges()
        .into_iter()
        .filter(|(_, dependent)| dependent == id)
        .filter(|(prerequisite, _)| prerequisite != id)
        .map(|(prerequisite, _)| prerequisite.name)
        .collect();
    names.dedup();
    names
}

/// `SCREAMING_SNAKE` environment variable name for a secret key
pub(crate) fn env_var_name(source: &str, key: &str) -> String {
    format!("{}_{}", sanitize_identifier(source), sanitize_identifier(key)).to_uppercase()
}

/// Identifier-safe form of a resource name (`db-credentials` ->
/// `db_credentials`)
pub(crate) fn sanitize_identifier(name: &str) -> String {
    name.replace(['-', '.'], "_")
}
