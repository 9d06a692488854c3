pub mod store;

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use store::GraphStore;

/// Bumped whenever the persisted document layout changes. A mismatched
/// version on load is treated as an absent document (full re-index).
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Location {
    pub fn new(
        file: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Function,
    Class,
    Method,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Function => "function",
            UnitKind::Class => "class",
            UnitKind::Method => "method",
        }
    }
}

/// A function/class/method-level span of source with a stable identity.
///
/// The id is derived from the owning file path, the start line, and the unit
/// name, so an unchanged unit keeps its id (and therefore its classification)
/// across runs even when unrelated parts of the file move around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: String,
    pub kind: UnitKind,
    pub name: String,
    pub source_text: String,
    /// File-level import statements, shared by every unit of the file.
    pub dependencies: Vec<String>,
    pub location: Location,
}

impl CodeUnit {
    pub fn new(
        kind: UnitKind,
        name: impl Into<String>,
        source_text: impl Into<String>,
        dependencies: Vec<String>,
        location: Location,
    ) -> Self {
        let name = name.into();
        let id = compute_unit_id(&location.file, location.start_line, &name, 0);
        Self {
            id,
            kind,
            name,
            source_text: source_text.into(),
            dependencies,
            location,
        }
    }
}

/// Computes a deterministic unit id.
///
/// Format: `unit:{16-char hex hash}`. `occurrence` disambiguates the rare
/// case of two same-named units starting on the same line.
pub fn compute_unit_id(path: &str, start_line: u32, name: &str, occurrence: u32) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    start_line.hash(&mut hasher);
    name.hash(&mut hasher);
    if occurrence > 0 {
        occurrence.hash(&mut hasher);
    }
    format!("unit:{:016x}", hasher.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    Consumer,
    Provider,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiCategory {
    Llm,
    Payment,
    Database,
    Cloud,
    Analytics,
    Email,
    Storage,
    Other,
}

impl ApiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiCategory::Llm => "llm",
            ApiCategory::Payment => "payment",
            ApiCategory::Database => "database",
            ApiCategory::Cloud => "cloud",
            ApiCategory::Analytics => "analytics",
            ApiCategory::Email => "email",
            ApiCategory::Storage => "storage",
            ApiCategory::Other => "other",
        }
    }
}

/// The role/category/provider/cost verdict for one CodeUnit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiClassification {
    pub role: ApiRole,
    pub category: ApiCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub is_paid: bool,
    pub confidence: f32,
}

impl ApiClassification {
    /// The low-confidence fallback used when classification degrades.
    pub fn unknown() -> Self {
        Self {
            role: ApiRole::None,
            category: ApiCategory::Other,
            provider: None,
            is_paid: false,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: String,
    pub last_modified: u64,
    pub unit_ids: Vec<String>,
}

/// The single persisted index artifact: files, units, and classifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodespaceGraph {
    pub schema_version: u32,
    pub generated_at: u64,
    pub files: Vec<FileRecord>,
    pub units: Vec<CodeUnit>,
    pub classifications: BTreeMap<String, ApiClassification>,
}

impl CodespaceGraph {
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: 0,
            files: Vec::new(),
            units: Vec::new(),
            classifications: BTreeMap::new(),
        }
    }

    pub fn units_for_file(&self, path: &str) -> Vec<&CodeUnit> {
        self.units
            .iter()
            .filter(|u| u.location.file == path)
            .collect()
    }

    pub fn classification(&self, unit_id: &str) -> Option<&ApiClassification> {
        self.classifications.get(unit_id)
    }

    /// Drops a file's record together with every unit and classification it
    /// owns. No-op when the path is not indexed.
    pub fn remove_file(&mut self, path: &str) {
        let Some(pos) = self.files.iter().position(|f| f.path == path) else {
            return;
        };
        let record = self.files.remove(pos);
        let owned: HashSet<&String> = record.unit_ids.iter().collect();
        self.units.retain(|u| !owned.contains(&u.id));
        self.classifications.retain(|id, _| !owned.contains(id));
    }

    /// Removes dangling unit ids from file records and dangling
    /// classification keys. Called before every save.
    pub fn prune(&mut self) {
        let known: HashSet<String> = self.units.iter().map(|u| u.id.clone()).collect();
        for record in &mut self.files {
            record.unit_ids.retain(|id| known.contains(id));
        }
        self.classifications.retain(|id, _| known.contains(id));
    }

    pub fn summary(&self) -> GraphSummary {
        let mut by_category: HashMap<String, usize> = HashMap::new();
        let mut by_provider: HashMap<String, usize> = HashMap::new();

        for classification in self.classifications.values() {
            if classification.role == ApiRole::None {
                continue;
            }
            *by_category
                .entry(classification.category.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(provider) = &classification.provider {
                *by_provider.entry(provider.clone()).or_insert(0) += 1;
            }
        }

        let mut by_category: Vec<(String, usize)> = by_category.into_iter().collect();
        by_category.sort();
        let mut by_provider: Vec<(String, usize)> = by_provider.into_iter().collect();
        by_provider.sort();

        GraphSummary {
            file_count: self.files.len(),
            unit_count: self.units.len(),
            by_category,
            by_provider,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub file_count: usize,
    pub unit_count: usize,
    pub by_category: Vec<(String, usize)>,
    pub by_provider: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostImpact {
    Low,
    Medium,
    High,
}

/// A single finding from the loop-cost detector. Recomputed on every pass,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub location: Location,
    pub cost_impact: CostImpact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
