//! Output writer
//!
//! Writes generated artifacts under a destination root. Writes are atomic
//! (tempfile + persist) and idempotent: a file whose on-disk content already
//! hashes to the artifact's content is skipped. Artifact paths are
//! resource-derived, so every path is checked against traversal out of the
//! root before any IO. Per-file failures are collected into the report and
//! never abort the rest of the batch.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{ManifoldError, ManifoldResult};
use crate::generate::Artifact;

/// Outcome of one write batch
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files created or overwritten with new content
    pub written: Vec<PathBuf>,
    /// Files whose content already matched
    pub unchanged: Vec<PathBuf>,
    /// Per-file failures; the rest of the batch still ran
    pub failures: Vec<(PathBuf, ManifoldError)>,
    /// Relative path to content hash for every artifact that landed on disk
    pub receipt: BTreeMap<String, String>,
}

impl WriteReport {
    /// True when every artifact landed
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.unchanged.len() + self.failures.len()
    }
}

/// Write every artifact under `root`, creating directories as needed.
///
/// Re-running with unchanged artifacts touches nothing and reports every
/// file as unchanged.
pub fn write_artifacts(root: &Path, artifacts: &[Artifact]) -> WriteReport {
    let mut report = WriteReport::default();

    for artifact in artifacts {
        let relative = artifact.path();
        match write_one(root, relative, artifact.content()) {
            Ok(changed) => {
                report.receipt.insert(
                    relative.display().to_string(),
                    hash_content(artifact.content().as_bytes()),
                );
                if changed {
                    report.written.push(relative.to_path_buf());
                } else {
                    report.unchanged.push(relative.to_path_buf());
                }
            }
            Err(error) => report.failures.push((relative.to_path_buf(), error)),
        }
    }

    tracing::debug!(
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        failed = report.failures.len(),
        "write batch finished"
    );
    report
}

/// Write one file atomically; returns false when the content already matched
fn write_one(root: &Path, relative: &Path, content: &str) -> ManifoldResult<bool> {
    let destination = safe_join(root, relative)?;

    if let Ok(existing) = std::fs::read(&destination) {
        if hash_content(&existing) == hash_content(content.as_bytes()) {
            return Ok(false);
        }
    }

    let parent = destination
        .parent()
        .ok_or_else(|| ManifoldError::UnsafePath {
            path: relative.to_path_buf(),
        })?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.persist(&destination)
        .map_err(|e| ManifoldError::Io(e.error))?;
    Ok(true)
}

/// Join a resource-derived relative path onto the root, refusing anything
/// that could land outside it.
fn safe_join(root: &Path, relative: &Path) -> ManifoldResult<PathBuf> {
    if relative.as_os_str().is_empty() {
        return Err(ManifoldError::UnsafePath {
            path: relative.to_path_buf(),
        });
    }
    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(ManifoldError::UnsafePath {
                    path: relative.to_path_buf(),
                })
            }
        }
    }
    Ok(root.join(relative))
}

/// `sha256:<hex>` digest of content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use tempfile::tempdir;

    fn artifact(path: &str, content: &str) -> Artifact {
        Artifact::new(Target::Manifest, path, content)
    }

    #[test]
    fn writes_create_directories_and_files() {
        let dir = tempdir().unwrap();
        let report = write_artifacts(
            dir.path(),
            &[artifact("manifest/default-application-api.yaml", "kind: Workload\n")],
        );

        assert!(report.ok());
        assert_eq!(report.written.len(), 1);
        let content =
            std::fs::read_to_string(dir.path().join("manifest/default-application-api.yaml"))
                .unwrap();
        assert_eq!(content, "kind: Workload\n");
    }

    #[test]
    fn rerun_is_idempotent() {
        let dir = tempdir().unwrap();
        let artifacts = [artifact("manifest/a.yaml", "a: 1\n")];

        let first = write_artifacts(dir.path(), &artifacts);
        assert_eq!(first.written.len(), 1);

        let second = write_artifacts(dir.path(), &artifacts);
        assert!(second.written.is_empty());
        assert_eq!(second.unchanged.len(), 1);
    }

    #[test]
    fn changed_content_is_overwritten() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path(), &[artifact("manifest/a.yaml", "a: 1\n")]);
        let report = write_artifacts(dir.path(), &[artifact("manifest/a.yaml", "a: 2\n")]);

        assert_eq!(report.written.len(), 1);
        let content = std::fs::read_to_string(dir.path().join("manifest/a.yaml")).unwrap();
        assert_eq!(content, "a: 2\n");
    }

    #[test]
    fn traversal_is_refused_without_aborting_the_batch() {
        let dir = tempdir().unwrap();
        let report = write_artifacts(
            dir.path(),
            &[
                artifact("../escape.yaml", "evil: true\n"),
                artifact("manifest/good.yaml", "good: true\n"),
            ],
        );

        assert!(!report.ok());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].1, ManifoldError::UnsafePath { .. }));
        assert!(dir.path().join("manifest/good.yaml").exists());
        assert!(!dir.path().parent().unwrap().join("escape.yaml").exists());
    }

    #[test]
    fn absolute_paths_are_refused() {
        let dir = tempdir().unwrap();
        let report = write_artifacts(dir.path(), &[artifact("/etc/evil.yaml", "evil: true\n")]);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn receipt_carries_content_hashes() {
        let dir = tempdir().unwrap();
        let report = write_artifacts(dir.path(), &[artifact("manifest/a.yaml", "a: 1\n")]);
        let hash = &report.receipt["manifest/a.yaml"];
        assert_eq!(hash, &hash_content(b"a: 1\n"));
        assert!(hash.starts_with("sha256:"));
    }

    #[test]
    fn hash_content_format() {
        let hash = hash_content(b"content");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 71);
    }
}
