use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use costlens::classify::{
    ClassificationOracle, ClassificationRequest, ClassificationResponse, Classifier, OracleFuture,
    RemoteClassifier, ResponseEntry,
};
use costlens::config::EngineConfig;
use costlens::graph::{ApiCategory, ApiClassification, ApiRole, CodeUnit, Location, UnitKind};

fn make_units(count: usize) -> Vec<CodeUnit> {
    (0..count)
        .map(|i| {
            CodeUnit::new(
                UnitKind::Function,
                format!("handler_{}", i),
                "svc.endpoint.call(payload);",
                vec!["import svc from 'svc';".to_string()],
                Location::new("src/handlers.ts", i as u32 * 8 + 1, 0, i as u32 * 8 + 4, 1),
            )
        })
        .collect()
}

fn config() -> Arc<EngineConfig> {
    let mut config = EngineConfig::default();
    config.retry_base_delay_ms = 1;
    Arc::new(config)
}

/// Scriptable oracle: answers every key except the dropped ones, optionally
/// shuffled, optionally failing the first N calls.
struct ScriptedOracle {
    calls: Arc<AtomicUsize>,
    chunk_sizes: Arc<Mutex<Vec<usize>>>,
    drop_keys: Vec<String>,
    reverse: bool,
    fail_first: usize,
}

impl ScriptedOracle {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            chunk_sizes: Arc::new(Mutex::new(Vec::new())),
            drop_keys: Vec::new(),
            reverse: false,
            fail_first: 0,
        }
    }
}

impl ClassificationOracle for ScriptedOracle {
    fn classify_chunk<'a>(&'a self, request: &'a ClassificationRequest) -> OracleFuture<'a> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.chunk_sizes.lock().unwrap().push(request.entries.len());
        if call < self.fail_first {
            return Box::pin(async {
                Err(costlens::error::EngineError::Transport(
                    "simulated outage".to_string(),
                ))
            });
        }
        let mut entries: Vec<ResponseEntry> = request
            .entries
            .iter()
            .filter(|e| !self.drop_keys.contains(&e.correlation_key))
            .map(|e| ResponseEntry {
                correlation_key: e.correlation_key.clone(),
                role: ApiRole::Consumer,
                category: ApiCategory::Database,
                provider: Some("mongodb".to_string()),
                is_paid: true,
                confidence: 0.75,
            })
            .collect();
        if self.reverse {
            entries.reverse();
        }
        Box::pin(async move { Ok(ClassificationResponse { entries }) })
    }
}

#[tokio::test]
async fn test_120_units_batch_50_issues_exactly_3_requests() {
    let units = make_units(120);
    let oracle = ScriptedOracle::new();
    let calls = oracle.calls.clone();
    let chunk_sizes = oracle.chunk_sizes.clone();
    let classifier = RemoteClassifier::new(config(), Box::new(oracle));

    let results = classifier.classify(&units, &mut |_, _| {}).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(*chunk_sizes.lock().unwrap(), vec![50, 50, 20]);
    assert_eq!(results.len(), 120);

    // Every unit got exactly one classification, keyed by its own id.
    let mut ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 120);
    for (id, classification) in &results {
        assert!(units.iter().any(|u| &u.id == id));
        assert_eq!(classification.provider.as_deref(), Some("mongodb"));
    }
}

#[tokio::test]
async fn test_reordered_response_still_correlates_by_key() {
    let units = make_units(7);
    let mut oracle = ScriptedOracle::new();
    oracle.reverse = true;
    let classifier = RemoteClassifier::new(config(), Box::new(oracle));

    let results = classifier.classify(&units, &mut |_, _| {}).await;
    for (unit, (id, _)) in units.iter().zip(results.iter()) {
        assert_eq!(&unit.id, id);
    }
}

#[tokio::test]
async fn test_missing_correlation_key_defaults_that_unit_only() {
    let units = make_units(6);
    let mut oracle = ScriptedOracle::new();
    oracle.drop_keys.push(units[1].id.clone());
    oracle.drop_keys.push(units[4].id.clone());
    let classifier = RemoteClassifier::new(config(), Box::new(oracle));

    let results = classifier.classify(&units, &mut |_, _| {}).await;
    assert_eq!(results.len(), 6);
    for (i, (_, classification)) in results.iter().enumerate() {
        if i == 1 || i == 4 {
            assert_eq!(classification, &ApiClassification::unknown());
        } else {
            assert_eq!(classification.category, ApiCategory::Database);
            assert!((classification.confidence - 0.75).abs() < f32::EPSILON);
        }
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_with_retry() {
    let units = make_units(3);
    let mut oracle = ScriptedOracle::new();
    oracle.fail_first = 1; // first attempt fails, retry succeeds
    let calls = oracle.calls.clone();
    let classifier = RemoteClassifier::new(config(), Box::new(oracle));

    let results = classifier.classify(&units, &mut |_, _| {}).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(results
        .iter()
        .all(|(_, c)| c.provider.as_deref() == Some("mongodb")));
}

#[tokio::test]
async fn test_persistent_failure_degrades_chunk_to_heuristics() {
    let mut units = make_units(2);
    units[0].dependencies = vec!["import Stripe from 'stripe';".to_string()];
    units[1].dependencies = vec!["const x = require('unknown-lib');".to_string()];
    units[1].source_text = "return x + 1;".to_string();

    let mut oracle = ScriptedOracle::new();
    oracle.fail_first = usize::MAX;
    let calls = oracle.calls.clone();
    let classifier = RemoteClassifier::new(config(), Box::new(oracle));

    let results = classifier.classify(&units, &mut |_, _| {}).await;

    // max_retries(2) + 1 initial attempt
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // The stripe unit is still recognized locally; the unknown one defaults.
    assert_eq!(results[0].1.category, ApiCategory::Payment);
    assert_eq!(results[0].1.provider.as_deref(), Some("stripe"));
    assert_eq!(results[1].1, ApiClassification::unknown());
}

#[tokio::test]
async fn test_quick_mode_never_calls_oracle() {
    let units = make_units(80);
    let classifier = Classifier::quick(config());

    let results = classifier.classify(&units, &mut |_, _| {}).await;
    assert_eq!(results.len(), 80);
    // Identical inputs yield identical verdicts: fully deterministic.
    let again = classifier.classify(&units, &mut |_, _| {}).await;
    assert_eq!(results, again);
}
