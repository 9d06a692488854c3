use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::graph::{CodespaceGraph, SCHEMA_VERSION};
use crate::scanner::HashManifest;

/// Owns the two workspace-local persisted documents: the serialized graph
/// and the path→hash manifest. All on-disk state goes through here.
pub struct GraphStore {
    graph_path: PathBuf,
    manifest_path: PathBuf,
}

impl GraphStore {
    pub fn new(graph_path: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            graph_path: graph_path.into(),
            manifest_path: manifest_path.into(),
        }
    }

    /// Loads the persisted graph. An absent, unreadable, or
    /// version-mismatched document yields `None` (full re-index), never an
    /// error.
    pub fn load_graph(&self) -> Option<CodespaceGraph> {
        let graph: CodespaceGraph = self.read_document(&self.graph_path)?;
        if graph.schema_version != SCHEMA_VERSION {
            warn!(
                "graph document has schema version {} (expected {}), ignoring",
                graph.schema_version, SCHEMA_VERSION
            );
            return None;
        }
        Some(graph)
    }

    /// Loads the hash manifest with the same absent-on-failure semantics as
    /// [`load_graph`](Self::load_graph).
    pub fn load_manifest(&self) -> Option<HashManifest> {
        let manifest: HashManifest = self.read_document(&self.manifest_path)?;
        if manifest.schema_version != SCHEMA_VERSION {
            warn!(
                "hash manifest has schema version {} (expected {}), ignoring",
                manifest.schema_version, SCHEMA_VERSION
            );
            return None;
        }
        Some(manifest)
    }

    /// Persists graph and manifest. Each document is written to a temp file
    /// and renamed into place so a crash mid-save never leaves a truncated
    /// document behind.
    pub fn save(&self, graph: &CodespaceGraph, manifest: &HashManifest) -> Result<()> {
        let graph_json = serde_json::to_vec_pretty(graph)
            .map_err(|e| EngineError::StoreCorruption(format!("serialize graph: {}", e)))?;
        let manifest_json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| EngineError::StoreCorruption(format!("serialize manifest: {}", e)))?;

        write_atomic(&self.graph_path, &graph_json)?;
        write_atomic(&self.manifest_path, &manifest_json)?;
        debug!(
            "persisted graph ({} files, {} units) to {}",
            graph.files.len(),
            graph.units.len(),
            self.graph_path.display()
        );
        Ok(())
    }

    /// Deletes the manifest so the next run re-indexes from scratch.
    pub fn discard_manifest(&self) -> Result<()> {
        match fs::remove_file(&self.manifest_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_document<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("unreadable document {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("corrupt document {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
