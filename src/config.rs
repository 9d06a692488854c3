use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::ApiCategory;

/// Engine configuration. The provider table, costly-call list, and keyword
/// vocabulary are data, not code: they drift as the ecosystem grows, so they
/// load from a JSON file while the matching logic stays put.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory names excluded from scanning on top of gitignore rules.
    pub ignore_dirs: Vec<String>,
    /// Units per remote classification request.
    pub batch_size: usize,
    /// Retries per failed chunk call before degrading to heuristics.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base_delay_ms: u64,
    /// Cap on concurrently parsed files.
    pub max_parse_workers: usize,
    /// Vocabulary matched (case-insensitively) against unit code and imports.
    pub keyword_vocabulary: Vec<String>,
    /// Known provider signatures, in significance order: the first match wins.
    pub provider_signatures: Vec<ProviderSignature>,
    /// Callee substrings the loop-cost detector treats as costly.
    pub costly_call_signatures: Vec<String>,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSignature {
    pub provider: String,
    pub category: ApiCategory,
    pub is_paid: bool,
    /// Substrings matched against import/require statements.
    pub module_patterns: Vec<String>,
    /// Substrings matched against dotted call signatures.
    pub call_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; never stored in config.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "COSTLENS_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| EngineError::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Config(format!("parse {}: {}", path.display(), e)))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: str_vec(&[
                "node_modules",
                "dist",
                "build",
                "out",
                "target",
                "coverage",
                "__pycache__",
                "venv",
                ".venv",
                ".git",
            ]),
            batch_size: 50,
            max_retries: 2,
            retry_base_delay_ms: 500,
            max_parse_workers: 8,
            keyword_vocabulary: str_vec(&[
                "api",
                "client",
                "request",
                "fetch",
                "payment",
                "charge",
                "invoice",
                "billing",
                "database",
                "query",
                "storage",
                "upload",
                "bucket",
                "completion",
                "embedding",
                "token",
                "webhook",
                "subscription",
            ]),
            provider_signatures: default_provider_signatures(),
            costly_call_signatures: str_vec(&[
                "chat.completions.create",
                "ChatCompletion.create",
                "completions.create",
                "messages.create",
                "generate_content",
                "generateContent",
                "embeddings.create",
                "stripe.charges",
                "paymentIntents.create",
                "PaymentIntent.create",
                "dynamodb.scan",
                "dynamodb.query",
                "s3.upload",
                "put_object",
                "getObject",
                "collection.find",
                "find_one",
                "aggregate(",
                "requests.get",
                "requests.post",
                "axios.get",
                "axios.post",
                "fetch(",
                "http.get",
                "urlopen(",
                ".execute(",
                ".query(",
            ]),
            oracle: OracleConfig::default(),
        }
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_provider_signatures() -> Vec<ProviderSignature> {
    fn sig(
        provider: &str,
        category: ApiCategory,
        is_paid: bool,
        modules: &[&str],
        calls: &[&str],
    ) -> ProviderSignature {
        ProviderSignature {
            provider: provider.to_string(),
            category,
            is_paid,
            module_patterns: str_vec(modules),
            call_patterns: str_vec(calls),
        }
    }

    vec![
        sig(
            "openai",
            ApiCategory::Llm,
            true,
            &["openai"],
            &["openai.", "ChatCompletion.", "chat.completions."],
        ),
        sig(
            "anthropic",
            ApiCategory::Llm,
            true,
            &["anthropic", "@anthropic-ai"],
            &["anthropic.", "messages.create"],
        ),
        sig(
            "google-gemini",
            ApiCategory::Llm,
            true,
            &["google.genai", "google.generativeai", "@google/generative-ai"],
            &["genai.", "generate_content", "generateContent"],
        ),
        sig(
            "stripe",
            ApiCategory::Payment,
            true,
            &["stripe"],
            &["stripe.", "paymentIntents.", "charges.create"],
        ),
        sig(
            "paypal",
            ApiCategory::Payment,
            true,
            &["paypal", "@paypal"],
            &["paypal."],
        ),
        sig(
            "aws-s3",
            ApiCategory::Storage,
            true,
            &["@aws-sdk/client-s3", "boto3"],
            &["s3.", "put_object", "getObject", "upload_file"],
        ),
        sig(
            "aws-dynamodb",
            ApiCategory::Database,
            true,
            &["@aws-sdk/client-dynamodb"],
            &["dynamodb."],
        ),
        sig(
            "aws",
            ApiCategory::Cloud,
            true,
            &["aws-sdk", "@aws-sdk", "botocore"],
            &["lambda.", "sqs.", "sns."],
        ),
        sig(
            "gcp",
            ApiCategory::Cloud,
            true,
            &["@google-cloud", "google.cloud"],
            &[],
        ),
        sig(
            "azure",
            ApiCategory::Cloud,
            true,
            &["@azure/", "azure."],
            &[],
        ),
        sig(
            "mongodb",
            ApiCategory::Database,
            true,
            &["mongodb", "mongoose", "pymongo", "motor"],
            &["collection.", "find_one", "insert_one", "aggregate"],
        ),
        sig(
            "postgres",
            ApiCategory::Database,
            false,
            &["pg", "psycopg2", "asyncpg", "sqlalchemy"],
            &["cursor.execute", "pool.query"],
        ),
        sig(
            "redis",
            ApiCategory::Database,
            false,
            &["redis", "ioredis"],
            &["redis."],
        ),
        sig(
            "supabase",
            ApiCategory::Database,
            true,
            &["@supabase/supabase-js", "supabase"],
            &["supabase."],
        ),
        sig(
            "firebase",
            ApiCategory::Database,
            true,
            &["firebase", "firebase-admin"],
            &["firestore."],
        ),
        sig(
            "twilio",
            ApiCategory::Email,
            true,
            &["twilio"],
            &["twilio.", "messages.create"],
        ),
        sig(
            "sendgrid",
            ApiCategory::Email,
            true,
            &["@sendgrid/mail", "sendgrid"],
            &["sgMail.", "sendgrid."],
        ),
        sig(
            "segment",
            ApiCategory::Analytics,
            true,
            &["analytics-node", "@segment/analytics-node", "segment"],
            &["analytics.track", "analytics.identify"],
        ),
    ]
}
