pub mod python;
pub mod typescript;

use std::collections::HashMap;
use std::path::Path;

pub use python::PYTHON;
pub use typescript::TYPESCRIPT;

/// A language parsed to a full AST via tree-sitter.
pub struct AstLanguage {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub language: fn() -> tree_sitter::Language,
    /// Query capturing function/class/method declarations.
    pub units_query: &'static str,
    /// Node kinds that open a loop construct.
    pub loop_kinds: &'static [&'static str],
}

/// A language without a reliable parser, handled by indentation-tracked
/// text scanning.
pub struct IndentLanguage {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub function_keyword: &'static str,
    pub class_keyword: &'static str,
    pub import_prefixes: &'static [&'static str],
    pub loop_keywords: &'static [&'static str],
    pub comment_prefix: &'static str,
}

/// Parser strategy for one language family. A closed set: extraction and
/// detection dispatch on this tag instead of a parser class hierarchy.
#[derive(Clone, Copy)]
pub enum Strategy {
    Ast(&'static AstLanguage),
    Indent(&'static IndentLanguage),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Ast(lang) => lang.name,
            Strategy::Indent(lang) => lang.name,
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Strategy::Ast(lang) => lang.extensions,
            Strategy::Indent(lang) => lang.extensions,
        }
    }
}

pub struct LanguageRegistry {
    extension_map: HashMap<&'static str, Strategy>,
    name_map: HashMap<&'static str, Strategy>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            extension_map: HashMap::new(),
            name_map: HashMap::new(),
        };
        registry.register(Strategy::Ast(&TYPESCRIPT));
        registry.register(Strategy::Indent(&PYTHON));
        registry
    }

    fn register(&mut self, strategy: Strategy) {
        for ext in strategy.extensions() {
            self.extension_map.insert(ext, strategy);
        }
        self.name_map.insert(strategy.name(), strategy);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Strategy> {
        self.name_map.get(name).copied()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<Strategy> {
        self.extension_map.get(ext).copied()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Strategy> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get_by_extension(ext))
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.get_for_file(path).is_some()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_typescript_family() {
        let registry = LanguageRegistry::new();
        for ext in ["ts", "tsx", "js", "jsx"] {
            let strategy = registry.get_by_extension(ext).unwrap();
            assert_eq!(strategy.name(), "typescript");
            assert!(matches!(strategy, Strategy::Ast(_)));
        }
    }

    #[test]
    fn test_registry_python() {
        let registry = LanguageRegistry::new();
        let strategy = registry.get_by_extension("py").unwrap();
        assert_eq!(strategy.name(), "python");
        assert!(matches!(strategy, Strategy::Indent(_)));
    }

    #[test]
    fn test_get_for_file() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.get_for_file(Path::new("src/app.ts")).unwrap().name(),
            "typescript"
        );
        assert_eq!(
            registry.get_for_file(Path::new("svc/main.py")).unwrap().name(),
            "python"
        );
        assert!(registry.get_for_file(Path::new("README.md")).is_none());
        assert!(registry.get_for_file(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_get_by_name() {
        let registry = LanguageRegistry::new();
        assert!(registry.get_by_name("typescript").is_some());
        assert!(registry.get_by_name("python").is_some());
        assert!(registry.get_by_name("cobol").is_none());
    }
}
