use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::EngineConfig;
use crate::extract::parser::{parse_source, ParsedSource};
use crate::graph::{CostImpact, Location, OptimizationSuggestion, Severity};
use crate::languages::{AstLanguage, IndentLanguage, LanguageRegistry, Strategy};

static LINE_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+)\s*\(")
        .expect("line call regex")
});

/// Flags costly call expressions lexically nested inside loop constructs.
///
/// A fast, local lint: it never consults the classification graph or the
/// store, and is recomputed fresh per analyzed document.
pub fn detect(
    source: &str,
    language_name: &str,
    file_path: &str,
    config: &EngineConfig,
) -> Vec<OptimizationSuggestion> {
    let registry = LanguageRegistry::new();
    let Some(strategy) = registry.get_by_name(language_name) else {
        warn!("loop detector: unknown language {}", language_name);
        return Vec::new();
    };
    match strategy {
        Strategy::Ast(language) => detect_ast(source, language, file_path, config),
        Strategy::Indent(language) => detect_indent(source, language, file_path, config),
    }
}

fn detect_ast(
    source: &str,
    language: &'static AstLanguage,
    file_path: &str,
    config: &EngineConfig,
) -> Vec<OptimizationSuggestion> {
    let parsed = match parse_source(source, language) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("loop detector: parse failed for {}: {}", file_path, e);
            return Vec::new();
        }
    };

    let mut suggestions = Vec::new();
    // Explicit stack walk carrying the loop nesting depth into descendants.
    let mut stack: Vec<(tree_sitter::Node, usize)> = vec![(parsed.root_node(), 0)];
    while let Some((node, loop_depth)) = stack.pop() {
        let depth = if language.loop_kinds.contains(&node.kind()) {
            loop_depth + 1
        } else {
            loop_depth
        };

        if depth > 0 && (node.kind() == "call_expression" || node.kind() == "new_expression") {
            if let Some(callee) = callee_name(&parsed, &node) {
                if let Some(signature) = match_costly(&callee, config) {
                    suggestions.push(build_suggestion(
                        &callee,
                        signature,
                        Location::new(
                            file_path,
                            node.start_position().row as u32 + 1,
                            node.start_position().column as u32,
                            node.end_position().row as u32 + 1,
                            node.end_position().column as u32,
                        ),
                    ));
                }
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push((child, depth));
        }
    }

    suggestions.sort_by_key(|s| (s.location.start_line, s.location.start_col));
    suggestions
}

/// Resolves the full dotted callee (`client.chat.completions.create`) of a
/// call or constructor expression.
fn callee_name(parsed: &ParsedSource, node: &tree_sitter::Node) -> Option<String> {
    let callee = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))?;
    let text = parsed.node_text(&callee);
    // A callee that is itself a call chain (`a.b().c`) keeps its raw text;
    // substring matching is tolerant of it.
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join("");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn detect_indent(
    source: &str,
    language: &'static IndentLanguage,
    file_path: &str,
    config: &EngineConfig,
) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();
    // Indentation levels of the loop headers currently in force.
    let mut loop_stack: Vec<usize> = Vec::new();

    for (i, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(language.comment_prefix) {
            continue;
        }
        let indent = line.chars().take_while(|c| c.is_whitespace()).count();

        while let Some(&top) = loop_stack.last() {
            if indent <= top {
                loop_stack.pop();
            } else {
                break;
            }
        }

        let is_loop_header = language.loop_keywords.iter().any(|kw| {
            trimmed
                .strip_prefix(kw)
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace()))
        });

        if !is_loop_header && !loop_stack.is_empty() {
            if let Some(signature) = config
                .costly_call_signatures
                .iter()
                .find(|sig| line.contains(sig.as_str()))
            {
                let callee = LINE_CALL_RE
                    .captures(line)
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| signature.trim_end_matches('(').to_string());
                suggestions.push(build_suggestion(
                    &callee,
                    signature,
                    Location::new(
                        file_path,
                        i as u32 + 1,
                        indent as u32,
                        i as u32 + 1,
                        line.len() as u32,
                    ),
                ));
            }
        }

        if is_loop_header {
            loop_stack.push(indent);
        }
    }

    suggestions
}

fn match_costly<'a>(callee: &str, config: &'a EngineConfig) -> Option<&'a String> {
    let candidate = format!("{}(", callee);
    config
        .costly_call_signatures
        .iter()
        .find(|sig| candidate.contains(sig.as_str()))
}

fn build_suggestion(
    callee: &str,
    signature: &str,
    location: Location,
) -> OptimizationSuggestion {
    let mut hasher = DefaultHasher::new();
    location.file.hash(&mut hasher);
    location.start_line.hash(&mut hasher);
    callee.hash(&mut hasher);

    OptimizationSuggestion {
        id: format!("loop-cost:{:016x}", hasher.finish()),
        title: format!("{} called inside a loop", callee),
        description: format!(
            "`{}` matches the costly operation signature `{}` and runs once per \
             iteration. Each call is likely billed or rate-limited.",
            callee, signature
        ),
        severity: Severity::Warning,
        location,
        cost_impact: CostImpact::High,
        action: Some(
            "Batch the requests, move the call out of the loop, or cache results \
             across iterations."
                .to_string(),
        ),
    }
}
