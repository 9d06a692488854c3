use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::{CodeUnit, Location};

/// Minimal classification input derived from one CodeUnit. Transient, never
/// persisted.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub code: String,
    pub imports: Vec<String>,
    pub location: Location,
}

/// Pure projection of a unit into its classification input.
pub fn bundle(unit: &CodeUnit) -> ContextBundle {
    ContextBundle {
        code: unit.source_text.clone(),
        imports: unit.dependencies.clone(),
        location: unit.location.clone(),
    }
}

/// The structural signals sent to the classifier. Only these ever leave the
/// process, never full source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSet {
    pub imports: Vec<String>,
    pub api_call_signatures: Vec<String>,
    pub keyword_hits: Vec<String>,
}

static CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+)\s*\(")
        .expect("call signature regex")
});

pub fn extract_patterns(bundle: &ContextBundle, vocabulary: &[String]) -> PatternSet {
    let mut seen = HashSet::new();
    let mut api_call_signatures = Vec::new();
    for capture in CALL_RE.captures_iter(&bundle.code) {
        let signature = capture[1].to_string();
        if seen.insert(signature.clone()) {
            api_call_signatures.push(signature);
        }
    }

    let code_lower = bundle.code.to_lowercase();
    let imports_lower: Vec<String> = bundle.imports.iter().map(|i| i.to_lowercase()).collect();
    let keyword_hits: Vec<String> = vocabulary
        .iter()
        .filter(|word| {
            let word = word.to_lowercase();
            code_lower.contains(&word) || imports_lower.iter().any(|i| i.contains(&word))
        })
        .cloned()
        .collect();

    PatternSet {
        imports: bundle.imports.clone(),
        api_call_signatures,
        keyword_hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::UnitKind;

    fn make_unit(code: &str, imports: &[&str]) -> CodeUnit {
        CodeUnit::new(
            UnitKind::Function,
            "f",
            code,
            imports.iter().map(|s| s.to_string()).collect(),
            Location::new("src/a.ts", 1, 0, 5, 1),
        )
    }

    #[test]
    fn test_bundle_is_pure_projection() {
        let unit = make_unit("const x = 1;", &["import Stripe from 'stripe';"]);
        let bundle = bundle(&unit);
        assert_eq!(bundle.code, unit.source_text);
        assert_eq!(bundle.imports, unit.dependencies);
        assert_eq!(bundle.location, unit.location);
    }

    #[test]
    fn test_dotted_call_signatures() {
        let unit = make_unit(
            "await client.chat.completions.create({}); db.users.find(q); plain();",
            &[],
        );
        let patterns = extract_patterns(&bundle(&unit), &[]);
        assert_eq!(
            patterns.api_call_signatures,
            vec!["client.chat.completions.create", "db.users.find"]
        );
    }

    #[test]
    fn test_call_signatures_deduplicated_in_order() {
        let unit = make_unit("a.b(); c.d(); a.b();", &[]);
        let patterns = extract_patterns(&bundle(&unit), &[]);
        assert_eq!(patterns.api_call_signatures, vec!["a.b", "c.d"]);
    }

    #[test]
    fn test_keyword_hits_case_insensitive() {
        let unit = make_unit(
            "const res = await Client.post(url);",
            &["import { PaymentGateway } from 'gateway';"],
        );
        let vocabulary: Vec<String> = ["client", "payment", "database"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let patterns = extract_patterns(&bundle(&unit), &vocabulary);
        assert_eq!(patterns.keyword_hits, vec!["client", "payment"]);
    }
}
