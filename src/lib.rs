//! Manifold - declarative application compiler
//!
//! Manifold takes a graph of declared deployable resources (applications,
//! stateful services, secrets, config, jobs, networking and access-control
//! objects) and compiles it into several deployment formats: per-resource
//! manifests, an aggregate compose file, a templated package skeleton,
//! overlay patches, and infrastructure-as-code blocks.
//!
//! The pipeline is a single pass over an immutable snapshot:
//! builder -> snapshot -> dependency resolution -> validation -> generation
//! -> writing. Identical input compiles to byte-identical output.

pub mod builder;
pub mod compile;
pub mod context;
pub mod error;
pub mod generate;
pub mod graph;
pub mod models;
pub mod resolver;
pub mod target;
pub mod validate;
pub mod writer;

// Re-exports for convenience
pub use builder::GraphBuilder;
pub use compile::{compile, compile_with, validate_only, CompilationResult};
pub use context::{CompileContext, ContextWarning, NamespaceQuota, SecurityMode};
pub use error::{ManifoldError, ManifoldResult};
pub use generate::{Artifact, Generator, GeneratorRegistry};
pub use graph::Graph;
pub use models::{Kind, Reference, ReferenceRole, Resource, ResourceId, ResourceSpec};
pub use resolver::{deploy_order, CycleError};
pub use target::Target;
pub use validate::{Diagnostic, Severity};
pub use writer::{write_artifacts, WriteReport};
