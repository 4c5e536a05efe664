//! Writer behavior against a real temporary directory: idempotent re-runs,
//! traversal refusal, and failure isolation.

mod common;

use common::web_stack_graph;
use manifold::{compile, write_artifacts, CompileContext, Target};
use tempfile::tempdir;

#[test]
fn full_pipeline_writes_and_rewrites_cleanly() {
    let context = CompileContext::default();
    let graph = web_stack_graph(&context);
    let result = compile(&graph, &context, &[]);
    assert!(result.succeeded());

    let dir = tempdir().unwrap();
    let first = write_artifacts(dir.path(), &result.artifacts);
    assert!(first.ok());
    assert_eq!(first.written.len(), result.artifacts.len());
    assert!(first.unchanged.is_empty());

    // Every target directory exists and holds what it should.
    for target in Target::ALL_CONCRETE {
        assert!(dir.path().join(target.directory_name()).is_dir());
    }
    assert!(dir.path().join("compose/compose.yaml").is_file());
    assert!(dir.path().join("package/values.yaml").is_file());

    // Second run touches nothing.
    let second = write_artifacts(dir.path(), &result.artifacts);
    assert!(second.ok());
    assert!(second.written.is_empty());
    assert_eq!(second.unchanged.len(), result.artifacts.len());
}

#[test]
fn written_bytes_match_artifact_bytes() {
    let context = CompileContext::default();
    let graph = web_stack_graph(&context);
    let result = compile(&graph, &context, &[Target::Manifest]);

    let dir = tempdir().unwrap();
    write_artifacts(dir.path(), &result.artifacts);

    for artifact in &result.artifacts {
        let on_disk = std::fs::read_to_string(dir.path().join(artifact.path())).unwrap();
        assert_eq!(on_disk, artifact.content());
    }
}

#[test]
fn receipt_covers_every_written_file() {
    let context = CompileContext::default();
    let graph = web_stack_graph(&context);
    let result = compile(&graph, &context, &[Target::Manifest, Target::Infra]);

    let dir = tempdir().unwrap();
    let report = write_artifacts(dir.path(), &result.artifacts);

    assert_eq!(report.receipt.len(), result.artifacts.len());
    for hash in report.receipt.values() {
        assert!(hash.starts_with("sha256:"));
    }
}
