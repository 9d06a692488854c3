pub mod classify;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod graph;
pub mod indexer;
pub mod languages;
pub mod scanner;

pub use classify::{
    ClassificationOracle, ClassificationRequest, ClassificationResponse, Classifier,
    ContextBundle, HttpOracle, PatternSet, QuickClassifier, RemoteClassifier,
};
pub use config::{EngineConfig, OracleConfig, ProviderSignature};
pub use detector::detect;
pub use error::{EngineError, Result};
pub use extract::UnitExtractor;
pub use graph::{
    ApiCategory, ApiClassification, ApiRole, CodeUnit, CodespaceGraph, CostImpact, FileRecord,
    GraphStore, GraphSummary, Location, OptimizationSuggestion, Severity, UnitKind,
};
pub use indexer::{IndexOptions, IndexOrchestrator, IndexingProgress, PhaseEvent};
pub use languages::{LanguageRegistry, Strategy};
pub use scanner::{diff, FileDescriptor, HashManifest, ScanDiff, Scanner};
