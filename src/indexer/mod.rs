pub mod progress;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use progress::{IndexingProgress, PhaseEvent, ProgressSnapshot};

use crate::classify::Classifier;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::extract::UnitExtractor;
use crate::graph::{now_millis, CodeUnit, CodespaceGraph, FileRecord, GraphStore};
use crate::scanner::{self, HashManifest, Scanner};

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Optional path prefix; files outside it are left untouched.
    pub scope: Option<String>,
    /// Discards the prior manifest, forcing a full re-index.
    pub force_clean: bool,
}

type PhaseCallback = Box<dyn Fn(PhaseEvent) + Send + Sync>;

/// Drives one indexing run through its phases:
/// scan -> diff -> extract -> classify -> persist.
///
/// All mutation of the graph and of on-disk state happens here. Files outside
/// the modified set keep their units and classifications untouched, and disk
/// is only written in the persist phase, so a cancelled run leaves the
/// previous state intact.
pub struct IndexOrchestrator {
    config: Arc<EngineConfig>,
    scanner: Scanner,
    extractor: Arc<UnitExtractor>,
    classifier: Classifier,
    store: GraphStore,
    progress: IndexingProgress,
    on_phase: Option<PhaseCallback>,
}

impl IndexOrchestrator {
    pub fn new(config: Arc<EngineConfig>, store: GraphStore, classifier: Classifier) -> Self {
        Self {
            scanner: Scanner::new(&config),
            extractor: Arc::new(UnitExtractor::new()),
            config,
            classifier,
            store,
            progress: IndexingProgress::new(),
            on_phase: None,
        }
    }

    pub fn with_phase_callback(
        mut self,
        callback: impl Fn(PhaseEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_phase = Some(Box::new(callback));
        self
    }

    pub fn progress(&self) -> IndexingProgress {
        self.progress.clone()
    }

    fn emit(&self, event: PhaseEvent) {
        if let Some(callback) = &self.on_phase {
            callback(event);
        }
    }

    pub async fn index_workspace(
        &self,
        root: &Path,
        options: &IndexOptions,
        cancel: &CancellationToken,
    ) -> Result<CodespaceGraph> {
        if options.force_clean {
            self.store.discard_manifest()?;
        }

        let mut graph = self.store.load_graph().unwrap_or_else(CodespaceGraph::empty);
        let previous = self.store.load_manifest().unwrap_or_else(HashManifest::new);

        self.emit(PhaseEvent::Scanning);
        let mut descriptors = self.scanner.scan(root)?;
        if let Some(prefix) = &options.scope {
            descriptors.retain(|d| d.path.starts_with(prefix.as_str()));
        }

        let mut current: BTreeMap<String, String> = descriptors
            .iter()
            .map(|d| (d.path.clone(), d.hash.clone()))
            .collect();
        if let Some(prefix) = &options.scope {
            // Out-of-scope files are untouched, not removed.
            for (path, hash) in &previous.hashes {
                if !path.starts_with(prefix.as_str()) {
                    current.insert(path.clone(), hash.clone());
                }
            }
        }

        let diff = scanner::diff(&current, &previous.hashes);
        if diff.is_empty() {
            info!("workspace unchanged, nothing to index");
            self.emit(PhaseEvent::Finished);
            return Ok(graph);
        }
        info!(
            "diff: {} added, {} changed, {} removed",
            diff.added.len(),
            diff.changed.len(),
            diff.removed.len()
        );
        if cancel.is_cancelled() {
            return self.cancelled(graph);
        }

        for path in &diff.removed {
            graph.remove_file(path);
        }

        let modified: HashSet<&str> = diff
            .added
            .iter()
            .chain(diff.changed.iter())
            .map(String::as_str)
            .collect();
        let targets: Vec<_> = descriptors
            .iter()
            .filter(|d| modified.contains(d.path.as_str()))
            .cloned()
            .collect();
        for descriptor in &targets {
            graph.remove_file(&descriptor.path);
        }

        let total = targets.len();
        self.progress.start(total);
        self.emit(PhaseEvent::Extracting { done: 0, total });

        let semaphore = Arc::new(Semaphore::new(self.config.max_parse_workers.max(1)));
        let mut join_set = JoinSet::new();
        for descriptor in targets {
            let root = root.to_path_buf();
            let extractor = self.extractor.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (descriptor, Vec::new(), true),
                };
                let rel = descriptor.path.clone();
                let parsed =
                    tokio::task::spawn_blocking(move || extractor.extract_file(&root, &rel))
                        .await;
                match parsed {
                    Ok(Ok(units)) => (descriptor, units, false),
                    Ok(Err(e)) => {
                        warn!("failed to extract {}: {}", descriptor.path, e);
                        (descriptor, Vec::new(), true)
                    }
                    Err(e) => {
                        warn!("extraction task failed for {}: {}", descriptor.path, e);
                        (descriptor, Vec::new(), true)
                    }
                }
            });
        }

        let mut new_units: Vec<CodeUnit> = Vec::new();
        let mut done = 0usize;
        while let Some(joined) = join_set.join_next().await {
            if cancel.is_cancelled() {
                join_set.abort_all();
                return self.cancelled(graph);
            }
            done += 1;
            match joined {
                Ok((descriptor, units, had_error)) => {
                    if had_error {
                        self.progress.inc_error();
                    } else {
                        self.progress.inc(units.len());
                    }
                    graph.files.push(FileRecord {
                        path: descriptor.path,
                        content_hash: descriptor.hash,
                        last_modified: descriptor.mtime,
                        unit_ids: units.iter().map(|u| u.id.clone()).collect(),
                    });
                    graph.units.extend(units.iter().cloned());
                    new_units.extend(units);
                }
                Err(e) => {
                    warn!("extraction worker panicked: {}", e);
                    self.progress.inc_error();
                }
            }
            self.emit(PhaseEvent::Extracting { done, total });
        }

        if cancel.is_cancelled() {
            return self.cancelled(graph);
        }

        // Deterministic chunking order regardless of join order.
        new_units.sort_by(|a, b| {
            (&a.location.file, a.location.start_line, &a.name)
                .cmp(&(&b.location.file, b.location.start_line, &b.name))
        });

        let mut on_chunk = |chunk: usize, chunks: usize| {
            self.emit(PhaseEvent::Classifying { chunk, chunks });
        };
        // Racing against the token lets a cancel land between chunks, not
        // just between phases.
        let classified = tokio::select! {
            results = self.classifier.classify(&new_units, &mut on_chunk) => results,
            _ = cancel.cancelled() => return self.cancelled(graph),
        };
        for (unit_id, classification) in classified {
            graph.classifications.insert(unit_id, classification);
        }

        if cancel.is_cancelled() {
            return self.cancelled(graph);
        }

        self.emit(PhaseEvent::Persisting);
        graph.files.sort_by(|a, b| a.path.cmp(&b.path));
        graph.units.sort_by(|a, b| {
            (&a.location.file, a.location.start_line, &a.name)
                .cmp(&(&b.location.file, b.location.start_line, &b.name))
        });
        graph.prune();
        graph.generated_at = now_millis();

        let manifest = HashManifest::from_hashes(current);
        self.store.save(&graph, &manifest)?;

        self.progress.finish();
        self.emit(PhaseEvent::Finished);
        Ok(graph)
    }

    /// Aborted between phases: the in-memory result is returned but nothing
    /// touches disk, so the previously persisted state stays valid.
    fn cancelled(&self, graph: CodespaceGraph) -> Result<CodespaceGraph> {
        info!("indexing cancelled, previous persisted state left intact");
        self.progress.finish();
        Ok(graph)
    }
}
