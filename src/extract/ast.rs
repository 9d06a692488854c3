use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::StreamingIterator;

use crate::error::{EngineError, Result};
use crate::extract::parser::ParsedSource;
use crate::graph::{compute_unit_id, CodeUnit, Location, UnitKind};

static REQUIRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brequire\s*\(").expect("require regex"));

/// Extracts function/class/method units from a parsed AST-language file.
///
/// Only top-level (or `export`-wrapped) declarations are emitted; methods are
/// qualified as `ClassName.methodName`. Every unit shares the file-level
/// import list.
pub fn extract_units(parsed: &ParsedSource, file_path: &str) -> Result<Vec<CodeUnit>> {
    let dependencies = extract_imports(parsed);

    let query = tree_sitter::Query::new(&(parsed.language.language)(), parsed.language.units_query)
        .map_err(|e| EngineError::Parse(format!("invalid units query: {}", e)))?;

    let mut candidates: Vec<(UnitKind, String, tree_sitter::Node)> = Vec::new();
    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&query, parsed.root_node(), parsed.source_bytes());

    while let Some(m) = matches.next() {
        let mut name: Option<&str> = None;
        let mut class_name: Option<&str> = None;
        let mut method_name: Option<&str> = None;
        let mut kind = UnitKind::Function;
        let mut node: Option<tree_sitter::Node> = None;

        for capture in m.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            let text = parsed.node_text(&capture.node);

            match capture_name {
                "name" => name = Some(text),
                "class_name" => class_name = Some(text),
                "method_name" => method_name = Some(text),
                "function" | "named_arrow" => {
                    node = Some(capture.node);
                    kind = UnitKind::Function;
                }
                "class" => {
                    node = Some(capture.node);
                    kind = UnitKind::Class;
                }
                "method" => {
                    node = Some(capture.node);
                    kind = UnitKind::Method;
                }
                _ => {}
            }
        }

        let Some(node) = node else { continue };

        match kind {
            UnitKind::Method => {
                let (Some(class_name), Some(method_name)) = (class_name, method_name) else {
                    continue;
                };
                // The enclosing class, not the method, must be top-level.
                let class_node = node
                    .parent() // class_body
                    .and_then(|n| n.parent());
                if class_node.is_some_and(is_top_level) {
                    candidates.push((
                        UnitKind::Method,
                        format!("{}.{}", class_name, method_name),
                        node,
                    ));
                }
            }
            _ => {
                let Some(name) = name else { continue };
                if is_top_level(node) {
                    candidates.push((kind, name.to_string(), node));
                }
            }
        }
    }

    candidates.sort_by_key(|(_, name, node)| {
        (node.start_position().row, node.start_position().column, name.clone())
    });

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut units = Vec::with_capacity(candidates.len());
    for (kind, name, node) in candidates {
        let location = Location::new(
            file_path,
            node.start_position().row as u32 + 1,
            node.start_position().column as u32,
            node.end_position().row as u32 + 1,
            node.end_position().column as u32,
        );
        let mut unit = CodeUnit::new(
            kind,
            name,
            parsed.node_text(&node),
            dependencies.clone(),
            location,
        );
        let mut occurrence = 0;
        while !seen_ids.insert(unit.id.clone()) {
            occurrence += 1;
            unit.id = compute_unit_id(
                &unit.location.file,
                unit.location.start_line,
                &unit.name,
                occurrence,
            );
        }
        units.push(unit);
    }

    Ok(units)
}

/// Declarations count as top-level when their only ancestors are the program
/// root, an export wrapper, or the declaration statement itself.
fn is_top_level(node: tree_sitter::Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "program" => return true,
            "export_statement" | "lexical_declaration" | "variable_declaration" => {
                current = parent.parent();
            }
            _ => return false,
        }
    }
    false
}

/// All top-level import/require statements, textual.
fn extract_imports(parsed: &ParsedSource) -> Vec<String> {
    let mut imports = Vec::new();
    let root = parsed.root_node();
    let mut cursor = root.walk();

    for child in root.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                imports.push(parsed.node_text(&child).trim().to_string());
            }
            "export_statement" => {
                // Re-exports (`export ... from '...'`) are dependencies too.
                if child.child_by_field_name("source").is_some() {
                    imports.push(parsed.node_text(&child).trim().to_string());
                }
            }
            "lexical_declaration" | "variable_declaration" | "expression_statement" => {
                let text = parsed.node_text(&child);
                if REQUIRE_RE.is_match(text) {
                    imports.push(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    imports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parser::parse_source;
    use crate::graph::UnitKind;
    use crate::languages::TYPESCRIPT;

    fn extract(source: &str) -> Vec<CodeUnit> {
        let parsed = parse_source(source, &TYPESCRIPT).unwrap();
        extract_units(&parsed, "src/app.ts").unwrap()
    }

    #[test]
    fn test_extract_top_level_function() {
        let units = extract("function fetchUsers() { return fetch('/api/users'); }");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Function);
        assert_eq!(units[0].name, "fetchUsers");
        assert!(units[0].source_text.starts_with("function fetchUsers"));
        assert_eq!(units[0].location.start_line, 1);
    }

    #[test]
    fn test_extract_exported_function() {
        let units = extract("export function run() { return 1; }");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "run");
    }

    #[test]
    fn test_extract_arrow_function_const() {
        let units = extract("const handler = async () => { return 1; };");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Function);
        assert_eq!(units[0].name, "handler");
    }

    #[test]
    fn test_extract_class_and_methods() {
        let source = r#"
class BillingService {
    charge(amount: number) {
        return amount;
    }

    refund(amount: number) {
        return -amount;
    }
}
"#;
        let units = extract(source);
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "BillingService",
                "BillingService.charge",
                "BillingService.refund"
            ]
        );
        assert_eq!(units[0].kind, UnitKind::Class);
        assert_eq!(units[1].kind, UnitKind::Method);
    }

    #[test]
    fn test_nested_function_not_extracted() {
        let source = r#"
function outer() {
    function inner() { return 2; }
    return inner();
}
"#;
        let units = extract(source);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "outer");
    }

    #[test]
    fn test_imports_shared_by_all_units() {
        let source = r#"
import OpenAI from 'openai';
import { db } from './db';
const legacy = require('stripe');

function a() { return 1; }
function b() { return 2; }
"#;
        let units = extract(source);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| !u.dependencies.is_empty()));
        let deps = &units[0].dependencies;
        assert_eq!(deps.len(), 3);
        assert!(deps[0].contains("openai"));
        assert!(deps[2].contains("require('stripe')"));
    }

    #[test]
    fn test_unit_ids_stable_and_unique() {
        let source = "function a() {}\nfunction b() {}\n";
        let first = extract(source);
        let second = extract(source);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[1].id, second[1].id);
        assert_ne!(first[0].id, first[1].id);
    }
}
