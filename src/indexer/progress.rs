use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Emitted at phase boundaries of an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Scanning,
    Extracting { done: usize, total: usize },
    Classifying { chunk: usize, chunks: usize },
    Persisting,
    Finished,
}

#[derive(Clone)]
pub struct IndexingProgress {
    inner: Arc<Inner>,
}

struct Inner {
    files_total: AtomicUsize,
    files_processed: AtomicUsize,
    units_extracted: AtomicUsize,
    errors: AtomicUsize,
    is_active: AtomicBool,
    started_at: Mutex<Option<Instant>>,
}

pub struct ProgressSnapshot {
    pub is_active: bool,
    pub files_total: usize,
    pub files_processed: usize,
    pub units_extracted: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
}

impl IndexingProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                files_total: AtomicUsize::new(0),
                files_processed: AtomicUsize::new(0),
                units_extracted: AtomicUsize::new(0),
                errors: AtomicUsize::new(0),
                is_active: AtomicBool::new(false),
                started_at: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self, total_files: usize) {
        self.inner.files_total.store(total_files, Ordering::Release);
        self.inner.files_processed.store(0, Ordering::Release);
        self.inner.units_extracted.store(0, Ordering::Release);
        self.inner.errors.store(0, Ordering::Release);
        self.inner.is_active.store(true, Ordering::Release);
        if let Ok(mut started) = self.inner.started_at.lock() {
            *started = Some(Instant::now());
        }
    }

    pub fn inc(&self, units_count: usize) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .units_extracted
            .fetch_add(units_count, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.inner.is_active.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let elapsed_ms = self
            .inner
            .started_at
            .lock()
            .ok()
            .and_then(|started| *started)
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        ProgressSnapshot {
            is_active: self.inner.is_active.load(Ordering::Acquire),
            files_total: self.inner.files_total.load(Ordering::Acquire),
            files_processed: self.inner.files_processed.load(Ordering::Acquire),
            units_extracted: self.inner.units_extracted.load(Ordering::Acquire),
            errors: self.inner.errors.load(Ordering::Acquire),
            elapsed_ms,
        }
    }
}

impl Default for IndexingProgress {
    fn default() -> Self {
        Self::new()
    }
}
