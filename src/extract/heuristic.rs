use std::collections::HashSet;

use crate::graph::{compute_unit_id, CodeUnit, Location, UnitKind};
use crate::languages::IndentLanguage;

struct OpenBlock {
    emit: Option<UnitKind>,
    name: String,
    indent: usize,
    start_line: usize,
}

/// Extracts units from an indentation-structured language by scanning for
/// `def`/`class` headers. A block runs until the next non-blank line at the
/// header's indentation or shallower; blank lines never close a block.
pub fn extract_units(
    source: &str,
    language: &'static IndentLanguage,
    file_path: &str,
) -> Vec<CodeUnit> {
    let lines: Vec<&str> = source.lines().collect();

    let dependencies: Vec<String> = lines
        .iter()
        .filter_map(|line| {
            let trimmed = line.trim();
            language
                .import_prefixes
                .iter()
                .any(|p| trimmed.starts_with(p))
                .then(|| trimmed.to_string())
        })
        .collect();

    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut closed: Vec<(OpenBlock, usize)> = Vec::new();
    let mut prev_nonblank: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_width(line);

        while let Some(top) = stack.last() {
            if indent <= top.indent {
                let block = stack.pop().unwrap();
                let end = prev_nonblank.unwrap_or(block.start_line);
                closed.push((block, end));
            } else {
                break;
            }
        }

        if let Some((is_class, name)) = parse_header(line.trim_start(), language) {
            let emit = if is_class {
                stack.is_empty().then_some(UnitKind::Class)
            } else {
                match stack.last() {
                    None => Some(UnitKind::Function),
                    Some(parent) if parent.emit == Some(UnitKind::Class) => Some(UnitKind::Method),
                    Some(_) => None,
                }
            };
            let name = match (&emit, stack.last()) {
                (Some(UnitKind::Method), Some(parent)) => format!("{}.{}", parent.name, name),
                _ => name,
            };
            // Decorators directly above the header belong to the unit.
            let mut start_line = i;
            while start_line > 0 {
                let above = lines[start_line - 1];
                if above.trim_start().starts_with('@') && indent_width(above) == indent {
                    start_line -= 1;
                } else {
                    break;
                }
            }
            stack.push(OpenBlock {
                emit,
                name,
                indent,
                start_line,
            });
        }

        prev_nonblank = Some(i);
    }

    while let Some(block) = stack.pop() {
        let end = prev_nonblank.unwrap_or(block.start_line);
        closed.push((block, end));
    }

    closed.sort_by_key(|(block, _)| block.start_line);

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut units = Vec::new();
    for (block, end) in closed {
        let Some(kind) = block.emit else { continue };
        let end = end.max(block.start_line);
        let source_text = lines[block.start_line..=end].join("\n");
        let location = Location::new(
            file_path,
            block.start_line as u32 + 1,
            block.indent as u32,
            end as u32 + 1,
            lines[end].len() as u32,
        );
        let mut unit = CodeUnit::new(kind, block.name, source_text, dependencies.clone(), location);
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

    units
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Returns `(is_class, name)` when the trimmed line opens a def/class block.
fn parse_header(trimmed: &str, language: &IndentLanguage) -> Option<(bool, String)> {
    let after_async = trimmed.strip_prefix("async ").unwrap_or(trimmed).trim_start();
    if let Some(rest) = strip_keyword(after_async, language.function_keyword) {
        return Some((false, ident_prefix(rest)?));
    }
    if let Some(rest) = strip_keyword(trimmed, language.class_keyword) {
        return Some((true, ident_prefix(rest)?));
    }
    None
}

fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(keyword)?;
    rest.starts_with(|c: char| c.is_whitespace())
        .then(|| rest.trim_start())
}

fn ident_prefix(s: &str) -> Option<String> {
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    (end > 0).then(|| s[..end].to_string())
}
