pub mod heuristic;
pub mod patterns;
pub mod remote;

use std::sync::Arc;

pub use heuristic::QuickClassifier;
pub use patterns::{bundle, extract_patterns, ContextBundle, PatternSet};
pub use remote::{
    ClassificationOracle, ClassificationRequest, ClassificationResponse, HttpOracle, OracleFuture,
    RemoteClassifier, RequestEntry, ResponseEntry,
};

use crate::config::EngineConfig;
use crate::graph::{ApiClassification, CodeUnit};

/// The two interchangeable classification strategies behind one call shape.
pub enum Classifier {
    Quick(QuickClassifier),
    Remote(RemoteClassifier),
}

impl Classifier {
    pub fn quick(config: Arc<EngineConfig>) -> Self {
        Classifier::Quick(QuickClassifier::new(config))
    }

    pub fn remote(config: Arc<EngineConfig>, oracle: Box<dyn ClassificationOracle>) -> Self {
        Classifier::Remote(RemoteClassifier::new(config, oracle))
    }

    /// Classifies a batch of units. `on_chunk` fires at each chunk boundary
    /// with `(chunk, total_chunks)`.
    pub async fn classify(
        &self,
        units: &[CodeUnit],
        on_chunk: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Vec<(String, ApiClassification)> {
        match self {
            Classifier::Quick(quick) => {
                if !units.is_empty() {
                    on_chunk(1, 1);
                }
                units
                    .iter()
                    .map(|unit| (unit.id.clone(), quick.classify_unit(unit)))
                    .collect()
            }
            Classifier::Remote(remote) => remote.classify(units, on_chunk).await,
        }
    }
}
