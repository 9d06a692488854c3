use crate::classify::patterns::{bundle, extract_patterns, PatternSet};
use crate::config::EngineConfig;
use crate::graph::{ApiClassification, ApiRole, CodeUnit};

/// Local, deterministic classification against the configured provider
/// table. Zero latency and zero cost; recall is bounded by the table.
pub struct QuickClassifier {
    config: std::sync::Arc<EngineConfig>,
}

impl QuickClassifier {
    pub fn new(config: std::sync::Arc<EngineConfig>) -> Self {
        Self { config }
    }

    pub fn classify_unit(&self, unit: &CodeUnit) -> ApiClassification {
        let patterns = extract_patterns(&bundle(unit), &self.config.keyword_vocabulary);
        self.classify_patterns(&patterns)
    }

    /// Table order is significance order: the first matching signature wins.
    /// Import-level evidence scores higher than call-shape evidence.
    pub fn classify_patterns(&self, patterns: &PatternSet) -> ApiClassification {
        for signature in &self.config.provider_signatures {
            let module_hit = signature.module_patterns.iter().any(|pattern| {
                patterns
                    .imports
                    .iter()
                    .any(|import| import.contains(pattern.as_str()))
            });
            let call_hit = signature.call_patterns.iter().any(|pattern| {
                patterns
                    .api_call_signatures
                    .iter()
                    .any(|call| format!("{}(", call).contains(pattern.as_str()))
            });

            if module_hit || call_hit {
                return ApiClassification {
                    role: ApiRole::Consumer,
                    category: signature.category,
                    provider: Some(signature.provider.clone()),
                    is_paid: signature.is_paid,
                    confidence: if module_hit { 0.9 } else { 0.7 },
                };
            }
        }
        ApiClassification::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ApiCategory, Location, UnitKind};
    use std::sync::Arc;

    fn classifier() -> QuickClassifier {
        QuickClassifier::new(Arc::new(EngineConfig::default()))
    }

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
    fn test_module_match_high_confidence() {
        let unit = make_unit(
            "const res = await client.chat.completions.create({});",
            &["import OpenAI from 'openai';"],
        );
        let classification = classifier().classify_unit(&unit);
        assert_eq!(classification.role, ApiRole::Consumer);
        assert_eq!(classification.category, ApiCategory::Llm);
        assert_eq!(classification.provider.as_deref(), Some("openai"));
        assert!(classification.is_paid);
        assert!((classification.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_call_match_lower_confidence() {
        let unit = make_unit("stripe.charges.create({ amount: 100 });", &[]);
        let classification = classifier().classify_unit(&unit);
        assert_eq!(classification.category, ApiCategory::Payment);
        assert_eq!(classification.provider.as_deref(), Some("stripe"));
        assert!((classification.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_no_match_is_unknown() {
        let unit = make_unit("return a + b;", &[]);
        let classification = classifier().classify_unit(&unit);
        assert_eq!(classification, ApiClassification::unknown());
    }

    #[test]
    fn test_deterministic() {
        let unit = make_unit(
            "pymongo_client.db.users.find_one({})",
            &["from pymongo import MongoClient"],
        );
        let c = classifier();
        assert_eq!(c.classify_unit(&unit), c.classify_unit(&unit));
    }
}
