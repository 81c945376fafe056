//! Run-scoped artifact and manifest persistence:
//! `<root>/<run_id>/<sanitized_filename>` and
//! `<root>/<run_id>/run_manifest.json`.

use std::path::{Path, PathBuf};

use atelier_protocol::{Artifact, RunManifest};

use crate::config::ArtifactsSettings;
use crate::error::{CoreError, CoreResult};

const MANIFEST_FILENAME: &str = "run_manifest.json";
const DEFAULT_ARTIFACT_NAME: &str = "artifact";

/// Persists output blobs and per-run audit manifests. Runs are isolated by
/// directory, so concurrent runs never contend on the same files; within a
/// run, callers persist sequentially.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    write_manifests: bool,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, write_manifests: bool) -> Self {
        Self {
            root: root.into(),
            write_manifests,
        }
    }

    pub fn from_settings(settings: &ArtifactsSettings) -> Self {
        Self::new(settings.root.clone(), settings.write_manifests)
    }

    /// The storage directory for a run. Not created by this accessor.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Idempotently create and return the storage directory for a run.
    pub async fn ensure_run_dir(&self, run_id: &str) -> CoreResult<PathBuf> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|error| {
            CoreError::Internal(format!(
                "failed to create run directory {}: {error}",
                dir.display()
            ))
        })?;
        Ok(dir)
    }

    /// Write an artifact's inline content into the run directory and return
    /// a copy with `content` cleared and `uri` pointing at the file.
    /// Artifacts without inline content pass through unchanged. Name
    /// collisions overwrite; callers supply distinguishing filenames when
    /// repeated writes to one run must not clobber each other.
    pub async fn store_artifact(&self, run_id: &str, artifact: Artifact) -> CoreResult<Artifact> {
        let content = match artifact.content.as_deref() {
            Some(content) if !content.is_empty() => content.to_string(),
            _ => return Ok(artifact),
        };

        let run_dir = self.ensure_run_dir(run_id).await?;
        let filename = sanitize_filename(&pick_filename(&artifact));
        let path = run_dir.join(&filename);

        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|error| {
                CoreError::Internal(format!(
                    "failed to write artifact {}: {error}",
                    path.display()
                ))
            })?;

        let mut stored = artifact;
        stored.content = None;
        stored.uri = Some(path.display().to_string());
        Ok(stored)
    }

    /// Serialize the manifest to its canonical location, returning the path,
    /// or `Ok(None)` when manifest-writing is disabled.
    pub async fn write_run_manifest(&self, manifest: &RunManifest) -> CoreResult<Option<PathBuf>> {
        if !self.write_manifests {
            return Ok(None);
        }

        let run_dir = self.ensure_run_dir(&manifest.run_id).await?;
        let path = run_dir.join(MANIFEST_FILENAME);
        let serialized = serde_json::to_vec_pretty(manifest)
            .map_err(|error| CoreError::Internal(format!("manifest serialize error: {error}")))?;
        tokio::fs::write(&path, serialized)
            .await
            .map_err(|error| {
                CoreError::Internal(format!(
                    "failed to write run manifest {}: {error}",
                    path.display()
                ))
            })?;
        Ok(Some(path))
    }
}

/// Filename preference: explicit `filename` metadata, then the basename of a
/// pre-set uri, then a generic default.
fn pick_filename(artifact: &Artifact) -> String {
    if let Some(name) = artifact
        .metadata
        .as_ref()
        .and_then(|meta| meta.get("filename"))
        .and_then(|value| value.as_str())
    {
        return name.to_string();
    }
    if let Some(uri) = &artifact.uri {
        if let Some(name) = Path::new(uri).file_name().and_then(|name| name.to_str()) {
            return name.to_string();
        }
    }
    DEFAULT_ARTIFACT_NAME.to_string()
}

/// Keep alphanumerics, dot, dash, and underscore only.
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if sanitized.is_empty() {
        DEFAULT_ARTIFACT_NAME.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_protocol::{RunStatus, ToolErrorDetail};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn store(dir: &Path, write_manifests: bool) -> ArtifactStore {
        ArtifactStore::new(dir.to_path_buf(), write_manifests)
    }

    #[tokio::test]
    async fn stores_inline_content_and_rewrites_uri() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let artifact = Artifact::inline("text/plain", "Hello World")
            .with_metadata("filename", json!("hello.txt"));
        let stored = store.store_artifact("run-1", artifact).await.expect("store");

        assert!(stored.content.is_none());
        let uri = stored.uri.expect("uri set");
        assert!(uri.ends_with("hello.txt"));
        let bytes = std::fs::read_to_string(&uri).expect("stored file");
        assert_eq!(bytes, "Hello World");
    }

    #[tokio::test]
    async fn artifact_without_content_passes_through() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let artifact = Artifact::reference("model/fbx", "/assets/tree.fbx");
        let unchanged = store
            .store_artifact("run-1", artifact.clone())
            .await
            .expect("no-op");

        assert_eq!(unchanged, artifact);
        assert!(!store.run_dir("run-1").exists());
    }

    #[tokio::test]
    async fn filename_falls_back_to_uri_basename() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let mut artifact = Artifact::inline("text/plain", "scene data");
        artifact.uri = Some("/staging/scene_v2.json".to_string());
        let stored = store.store_artifact("run-2", artifact).await.expect("store");

        let uri = stored.uri.expect("uri");
        assert!(uri.ends_with("scene_v2.json"));
        assert!(Path::new(&uri).starts_with(store.run_dir("run-2")));
    }

    #[tokio::test]
    async fn sanitization_strips_path_separators() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let artifact = Artifact::inline("text/plain", "x")
            .with_metadata("filename", json!("../../escape attempt!.txt"));
        let stored = store.store_artifact("run-3", artifact).await.expect("store");

        let uri = stored.uri.expect("uri");
        let path = Path::new(&uri);
        assert!(path.starts_with(store.run_dir("run-3")));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("....escapeattempt.txt")
        );
    }

    #[tokio::test]
    async fn collision_overwrites_previous_content() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let first = Artifact::inline("text/plain", "v1").with_metadata("filename", json!("out.txt"));
        let second =
            Artifact::inline("text/plain", "v2").with_metadata("filename", json!("out.txt"));
        store.store_artifact("run-4", first).await.expect("store");
        let stored = store.store_artifact("run-4", second).await.expect("store");

        let bytes = std::fs::read_to_string(stored.uri.unwrap()).expect("file");
        assert_eq!(bytes, "v2");
    }

    #[tokio::test]
    async fn manifest_written_pretty_at_canonical_location() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let mut manifest = RunManifest::pending("run-5", "req-5", "mock.tool", Utc::now());
        manifest.mark_error(ToolErrorDetail::new("VALIDATION_ERROR", "missing field"));
        manifest.finalize(Utc::now());

        let path = store
            .write_run_manifest(&manifest)
            .await
            .expect("write")
            .expect("path");
        assert_eq!(path, store.run_dir("run-5").join("run_manifest.json"));

        let raw = std::fs::read_to_string(&path).expect("manifest file");
        assert!(raw.contains('\n'), "manifest should be pretty-printed");
        let back: RunManifest = serde_json::from_str(&raw).expect("parse");
        assert_eq!(back.status, RunStatus::Error);
        assert_eq!(back.request_id, "req-5");
    }

    #[tokio::test]
    async fn disabled_manifests_write_nothing() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), false);

        let manifest = RunManifest::pending("run-6", "req-6", "mock.tool", Utc::now());
        let path = store.write_run_manifest(&manifest).await.expect("write");

        assert!(path.is_none());
        assert!(!store.run_dir("run-6").exists());
    }

    #[tokio::test]
    async fn ensure_run_dir_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path(), true);

        let first = store.ensure_run_dir("run-7").await.expect("create");
        let second = store.ensure_run_dir("run-7").await.expect("recreate");
        assert_eq!(first, second);
        assert!(first.is_dir());
    }
}
