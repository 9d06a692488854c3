pub mod ast;
pub mod heuristic;
pub mod parser;

use std::path::Path;

use tracing::warn;

use crate::error::{EngineError, Result};
use crate::graph::CodeUnit;
use crate::languages::{LanguageRegistry, Strategy};

pub struct UnitExtractor {
    registry: LanguageRegistry,
}

impl UnitExtractor {
    pub fn new() -> Self {
        Self {
            registry: LanguageRegistry::new(),
        }
    }

    /// Reads and extracts one workspace file. Units are keyed by `rel_path`.
    pub fn extract_file(&self, root: &Path, rel_path: &str) -> Result<Vec<CodeUnit>> {
        let full = root.join(rel_path);
        let strategy = self
            .registry
            .get_for_file(&full)
            .ok_or_else(|| EngineError::UnsupportedLanguage(rel_path.to_string()))?;
        let source = std::fs::read_to_string(&full)?;
        Ok(self.extract_source(&source, strategy, rel_path))
    }

    /// A parse failure yields an empty unit list for that file, never an
    /// aborted batch.
    pub fn extract_source(
        &self,
        source: &str,
        strategy: Strategy,
        rel_path: &str,
    ) -> Vec<CodeUnit> {
        match strategy {
            Strategy::Ast(language) => {
                match parser::parse_source(source, language)
                    .and_then(|parsed| ast::extract_units(&parsed, rel_path))
                {
                    Ok(units) => units,
                    Err(e) => {
                        warn!("parse failed for {}: {}", rel_path, e);
                        Vec::new()
                    }
                }
            }
            Strategy::Indent(language) => heuristic::extract_units(source, language, rel_path),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

impl Default for UnitExtractor {
    fn default() -> Self {
        Self::new()
    }
}
