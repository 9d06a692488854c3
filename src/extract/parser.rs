use crate::error::{EngineError, Result};
use crate::languages::AstLanguage;

pub struct ParsedSource {
    tree: tree_sitter::Tree,
    pub source: String,
    pub language: &'static AstLanguage,
}

pub fn parse_source(source: &str, language: &'static AstLanguage) -> Result<ParsedSource> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&(language.language)())
        .map_err(|e| EngineError::Parse(e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| EngineError::Parse("failed to parse source".to_string()))?;

    Ok(ParsedSource {
        tree,
        source: source.to_string(),
        language,
    })
}

impl ParsedSource {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::TYPESCRIPT;

    #[test]
    fn test_parse_source_typescript() {
        let parsed = parse_source("function greet(name: string) { return name; }", &TYPESCRIPT)
            .unwrap();
        assert_eq!(parsed.root_node().kind(), "program");
        assert!(parsed.root_node().child_count() > 0);
    }

    #[test]
    fn test_node_text_round_trip() {
        let source = "const x = 42;";
        let parsed = parse_source(source, &TYPESCRIPT).unwrap();
        let root = parsed.root_node();
        assert_eq!(parsed.node_text(&root), source);
    }

    #[test]
    fn test_parse_empty_source() {
        let parsed = parse_source("", &TYPESCRIPT).unwrap();
        assert_eq!(parsed.source, "");
    }
}
