use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::SCHEMA_VERSION;
use crate::languages::LanguageRegistry;

/// One scanned workspace file. `path` is relative to the scan root with
/// forward-slash separators so hashes and unit ids are machine-independent.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub path: String,
    pub hash: String,
    pub mtime: u64,
}

/// The persisted path→hash map from the previous run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashManifest {
    pub schema_version: u32,
    pub hashes: BTreeMap<String, String>,
}

impl HashManifest {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            hashes: BTreeMap::new(),
        }
    }

    pub fn from_hashes(hashes: BTreeMap<String, String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            hashes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

impl ScanDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

pub struct Scanner {
    registry: LanguageRegistry,
    ignore_dirs: Vec<String>,
}

impl Scanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registry: LanguageRegistry::new(),
            ignore_dirs: config.ignore_dirs.clone(),
        }
    }

    /// Enumerates supported files under `root` with content hashes.
    ///
    /// Unreadable or binary files are skipped with a warning; only a missing
    /// root aborts the scan.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileDescriptor>> {
        if !root.is_dir() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("workspace root not found: {}", root.display()),
            )));
        }

        let ignore_dirs = self.ignore_dirs.clone();
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && ignore_dirs.iter().any(|d| d == name.as_ref()))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.registry.is_supported(path) {
                continue;
            }
            match describe_file(root, path) {
                Ok(Some(descriptor)) => files.push(descriptor),
                Ok(None) => {}
                Err(e) => warn!("skipping unreadable file {}: {}", path.display(), e),
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn describe_file(root: &Path, path: &Path) -> Result<Option<FileDescriptor>> {
    let bytes = std::fs::read(path)?;
    if std::str::from_utf8(&bytes).is_err() {
        warn!("skipping binary file {}", path.display());
        return Ok(None);
    }

    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel.to_string_lossy().replace('\\', "/");

    let mtime = std::fs::metadata(path)?
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Ok(Some(FileDescriptor {
        path: rel,
        hash: format!("{:016x}", xxh3_64(&bytes)),
        mtime,
    }))
}

/// Set comparison on path plus hash equality.
pub fn diff(
    current: &BTreeMap<String, String>,
    previous: &BTreeMap<String, String>,
) -> ScanDiff {
    let mut result = ScanDiff::default();

    for (path, hash) in current {
        match previous.get(path) {
            None => result.added.push(path.clone()),
            Some(prev_hash) if prev_hash != hash => result.changed.push(path.clone()),
            Some(_) => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            result.removed.push(path.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> Scanner {
        Scanner::new(&EngineConfig::default())
    }

    fn create_file(dir: &Path, name: &str, content: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_finds_supported_files() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "src/app.ts", b"const x = 1;");
        create_file(dir.path(), "svc/worker.py", b"x = 1\n");
        create_file(dir.path(), "README.md", b"# readme");

        let files = scanner().scan(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/app.ts", "svc/worker.py"]);
    }

    #[test]
    fn test_scan_hash_depends_on_content_not_mtime() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.ts", b"const x = 1;");
        let first = scanner().scan(dir.path()).unwrap();

        // Rewrite the same bytes; the digest must not move.
        create_file(dir.path(), "a.ts", b"const x = 1;");
        let second = scanner().scan(dir.path()).unwrap();
        assert_eq!(first[0].hash, second[0].hash);

        create_file(dir.path(), "a.ts", b"const x = 2;");
        let third = scanner().scan(dir.path()).unwrap();
        assert_ne!(first[0].hash, third[0].hash);
    }

    #[test]
    fn test_scan_skips_binary_files() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "blob.ts", &[0xff, 0xfe, 0x00, 0x80]);
        create_file(dir.path(), "ok.ts", b"const x = 1;");

        let files = scanner().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "ok.ts");
    }

    #[test]
    fn test_scan_skips_ignored_dirs() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1;");
        create_file(dir.path(), "__pycache__/cached.py", b"x = 1");
        create_file(dir.path(), "src/app.ts", b"const x = 1;");

        let files = scanner().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/app.ts");
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(scanner().scan(&missing).is_err());
    }

    #[test]
    fn test_diff_added_changed_removed() {
        let mut previous = BTreeMap::new();
        previous.insert("a.ts".to_string(), "1111".to_string());
        previous.insert("b.ts".to_string(), "2222".to_string());
        previous.insert("c.ts".to_string(), "3333".to_string());

        let mut current = BTreeMap::new();
        current.insert("a.ts".to_string(), "1111".to_string());
        current.insert("b.ts".to_string(), "9999".to_string());
        current.insert("d.ts".to_string(), "4444".to_string());

        let diff = diff(&current, &previous);
        assert_eq!(diff.added, vec!["d.ts"]);
        assert_eq!(diff.changed, vec!["b.ts"]);
        assert_eq!(diff.removed, vec!["c.ts"]);
    }

    #[test]
    fn test_diff_identical_sets_is_empty() {
        let mut hashes = BTreeMap::new();
        hashes.insert("a.ts".to_string(), "1111".to_string());
        let diff = diff(&hashes, &hashes.clone());
        assert!(diff.is_empty());
    }
}
