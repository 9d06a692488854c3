use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::heuristic::QuickClassifier;
use crate::classify::patterns::{bundle, extract_patterns};
use crate::config::{EngineConfig, OracleConfig};
use crate::error::{EngineError, Result};
use crate::graph::{ApiCategory, ApiClassification, ApiRole, CodeUnit};

/// One unit's signals in a chunk request. The correlation key ties the
/// response entry back to its unit; positional order is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEntry {
    pub correlation_key: String,
    pub imports: Vec<String>,
    pub api_call_signatures: Vec<String>,
    pub keyword_hits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub entries: Vec<RequestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub correlation_key: String,
    pub role: ApiRole,
    pub category: ApiCategory,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub entries: Vec<ResponseEntry>,
}

pub type OracleFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ClassificationResponse>> + Send + 'a>>;

/// Seam to the external classification service, substituted with a
/// deterministic stub in tests.
pub trait ClassificationOracle: Send + Sync {
    fn classify_chunk<'a>(&'a self, request: &'a ClassificationRequest) -> OracleFuture<'a>;
}

/// Batched remote classification: one oracle call per chunk of units,
/// chunks issued sequentially, results correlated by key.
pub struct RemoteClassifier {
    config: Arc<EngineConfig>,
    oracle: Box<dyn ClassificationOracle>,
    fallback: QuickClassifier,
}

impl RemoteClassifier {
    pub fn new(config: Arc<EngineConfig>, oracle: Box<dyn ClassificationOracle>) -> Self {
        let fallback = QuickClassifier::new(config.clone());
        Self {
            config,
            oracle,
            fallback,
        }
    }

    pub async fn classify(
        &self,
        units: &[CodeUnit],
        on_chunk: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Vec<(String, ApiClassification)> {
        let batch = self.config.batch_size.max(1);
        let chunks: Vec<&[CodeUnit]> = units.chunks(batch).collect();
        let total = chunks.len();

        let mut results = Vec::with_capacity(units.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            on_chunk(index + 1, total);
            let request = self.build_request(chunk);
            match self.call_with_retry(&request).await {
                Ok(response) => results.extend(self.merge_chunk(chunk, response)),
                Err(e) => {
                    warn!(
                        "classification chunk {}/{} degraded to heuristics: {}",
                        index + 1,
                        total,
                        e
                    );
                    results.extend(
                        chunk
                            .iter()
                            .map(|unit| (unit.id.clone(), self.fallback.classify_unit(unit))),
                    );
                }
            }
        }
        results
    }

    fn build_request(&self, chunk: &[CodeUnit]) -> ClassificationRequest {
        let entries = chunk
            .iter()
            .map(|unit| {
                let patterns =
                    extract_patterns(&bundle(unit), &self.config.keyword_vocabulary);
                RequestEntry {
                    correlation_key: unit.id.clone(),
                    imports: patterns.imports,
                    api_call_signatures: patterns.api_call_signatures,
                    keyword_hits: patterns.keyword_hits,
                }
            })
            .collect();
        ClassificationRequest { entries }
    }

    async fn call_with_retry(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse> {
        let mut attempt: u32 = 0;
        loop {
            match self.oracle.classify_chunk(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_retries => {
                    let delay =
                        Duration::from_millis(self.config.retry_base_delay_ms << attempt);
                    warn!(
                        "classification call failed (attempt {}): {}; retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Applies a validated chunk response. Every unit gets exactly one
    /// result: matched by key when present, the zero-confidence default when
    /// the response dropped or mangled its entry.
    fn merge_chunk(
        &self,
        chunk: &[CodeUnit],
        response: ClassificationResponse,
    ) -> Vec<(String, ApiClassification)> {
        let mut by_key: HashMap<String, ResponseEntry> = HashMap::new();
        for entry in response.entries {
            if by_key.contains_key(&entry.correlation_key) {
                warn!("duplicate correlation key {} in response", entry.correlation_key);
                continue;
            }
            by_key.insert(entry.correlation_key.clone(), entry);
        }

        let mut results = Vec::with_capacity(chunk.len());
        for unit in chunk {
            match by_key.remove(&unit.id) {
                Some(entry) => {
                    results.push((
                        unit.id.clone(),
                        ApiClassification {
                            role: entry.role,
                            category: entry.category,
                            provider: entry.provider,
                            is_paid: entry.is_paid,
                            confidence: entry.confidence.clamp(0.0, 1.0),
                        },
                    ));
                }
                None => {
                    warn!(
                        "response missing correlation key for unit {} ({})",
                        unit.name, unit.id
                    );
                    results.push((unit.id.clone(), ApiClassification::unknown()));
                }
            }
        }
        for key in by_key.keys() {
            warn!("response carried unknown correlation key {}", key);
        }
        results
    }
}

const SYSTEM_PROMPT: &str = "You classify code units by their use of external APIs. \
For every entry in the user's JSON, decide the unit's role (consumer, provider, none), \
category (llm, payment, database, cloud, analytics, email, storage, other), the canonical \
provider name if identifiable, whether the API is paid, and your confidence from 0 to 1. \
Echo each entry's correlationKey unchanged. Respond with exactly one JSON object of the \
form {\"entries\": [{\"correlationKey\", \"role\", \"category\", \"provider\", \
\"isPaid\", \"confidence\"}]} and nothing else.";

/// Production oracle: posts pattern chunks to an OpenAI-compatible
/// chat-completions endpoint and parses the strict-JSON reply.
pub struct HttpOracle {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            http,
        })
    }

    fn chat_completions_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.ends_with("/chat/completions") {
            endpoint.to_string()
        } else if endpoint.ends_with("/v1") {
            format!("{}/chat/completions", endpoint)
        } else {
            format!("{}/v1/chat/completions", endpoint)
        }
    }

    async fn complete(&self, request: &ClassificationRequest) -> Result<ClassificationResponse> {
        let body = serde_json::to_string(request)
            .map_err(|e| EngineError::Schema(format!("serialize request: {}", e)))?;
        let payload = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: body,
                },
            ],
            temperature: 0.0,
            stream: false,
        };

        let mut http_request = self.http.post(self.chat_completions_url()).json(&payload);
        if let Some(api_key) = self.api_key.as_ref() {
            http_request = http_request.bearer_auth(api_key);
        }
        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Transport(format!("classification request timed out: {}", e))
            } else {
                EngineError::Transport(format!("classification request failed: {}", e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(format!("failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(EngineError::Transport(format!(
                "classification endpoint returned HTTP {}: {}",
                status,
                truncate_for_error(&text)
            )));
        }

        let parsed: ChatCompletionsResponse = serde_json::from_str(&text).map_err(|e| {
            EngineError::Schema(format!(
                "invalid JSON from endpoint: {} (body={})",
                e,
                truncate_for_error(&text)
            ))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Schema("response had no choices".to_string()))?;

        parse_response_content(&content)
    }
}

impl ClassificationOracle for HttpOracle {
    fn classify_chunk<'a>(&'a self, request: &'a ClassificationRequest) -> OracleFuture<'a> {
        debug!(
            "issuing classification chunk with {} entries",
            request.entries.len()
        );
        Box::pin(self.complete(request))
    }
}

/// Parses the oracle's reply. The outer `{"entries": [...]}` shape must
/// parse; an individual entry that fails validation is dropped with a
/// warning, so its unit later falls back to the zero-confidence default
/// instead of the whole chunk failing.
fn parse_response_content(content: &str) -> Result<ClassificationResponse> {
    let json = strip_code_fences(content);
    let raw: RawClassificationResponse = serde_json::from_str(json).map_err(|e| {
        EngineError::Schema(format!(
            "malformed classification payload: {} (content={})",
            e,
            truncate_for_error(json)
        ))
    })?;

    let mut entries = Vec::with_capacity(raw.entries.len());
    for value in raw.entries {
        match serde_json::from_value::<ResponseEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("dropping malformed classification entry: {}", e),
        }
    }
    Ok(ClassificationResponse { entries })
}

#[derive(Debug, Deserialize)]
struct RawClassificationResponse {
    #[serde(default)]
    entries: Vec<serde_json::Value>,
}

/// Models routinely wrap JSON in a markdown fence despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn truncate_for_error(value: &str) -> String {
    const LIMIT: usize = 400;
    if value.len() <= LIMIT {
        value.to_string()
    } else {
        format!("{}...", &value[..LIMIT])
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: String,
}
