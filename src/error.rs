//! Error types for Manifold
//!
//! One `thiserror` enum covers the whole pipeline: identity errors raised at
//! snapshot time, ordering errors from the resolver, per-target generation
//! errors, and writer failures. Validation findings that do not abort the
//! pipeline are `Diagnostic` values (see `validate`), not errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Kind;
use crate::resolver::CycleError;
use crate::target::Target;

/// Result type alias for Manifold operations
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Main error type for Manifold operations
#[derive(Error, Debug)]
pub enum ManifoldError {
    /// Two resources share a `(kind, namespace, name)` identity
    #[error("duplicate {kind} '{name}' in namespace '{namespace}'")]
    DuplicateName {
        kind: Kind,
        namespace: String,
        name: String,
    },

    /// A resource is claimed as a member by more than one group
    #[error("resource '{member}' is owned by both group '{first}' and group '{second}'")]
    GroupOwnership {
        member: String,
        first: String,
        second: String,
    },

    /// The dependency graph has no topological order
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A generator cannot map a resource into its target schema
    #[error("{target} target cannot render {kind} '{name}': {message}")]
    Generate {
        target: Target,
        kind: Kind,
        name: String,
        message: String,
    },

    /// An artifact path would escape the output root
    #[error("unsafe output path '{path}'")]
    UnsafePath { path: PathBuf },

    /// Invalid context file
    #[error("invalid context file {file}: {message}")]
    Context { file: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
