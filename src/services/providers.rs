// AI Oracle Providers
// Implements the chat-completion gateway and the optional bulk humanizer.
// Both are reached through capability traits so the classifier and the
// humanization loop can be driven by scripted stand-ins in tests.

use std::env;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const GATEWAY_DEFAULT_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
const HUMANIZER_DEFAULT_URL: &str = "https://humanizeai.pro/api/humanize";

/// Model used for classification and scoring prompts.
pub const DETECTION_MODEL: &str = "google/gemini-2.5-pro";
/// Model used for rewrite prompts.
pub const REWRITE_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("rate limit exceeded (HTTP 429)")]
    RateLimited,
    #[error("credits depleted (HTTP 402)")]
    QuotaExhausted,
    #[error("oracle request failed: {status} - {message}")]
    Unavailable { status: u16, message: String },
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("missing content in oracle response")]
    MissingContent,
}

/// Map a non-2xx gateway status onto the error taxonomy. Rate and quota
/// statuses are distinguished because they must reach the caller verbatim.
pub fn classify_status(status: u16, message: String) -> OracleError {
    match status {
        429 => OracleError::RateLimited,
        402 => OracleError::QuotaExhausted,
        _ => OracleError::Unavailable { status, message },
    }
}

/// One prompt payload for the scoring or rewrite oracle.
#[derive(Debug, Clone)]
pub struct OracleCall<'a> {
    pub system: Option<&'a str>,
    pub user: &'a str,
    pub model: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl<'a> OracleCall<'a> {
    pub fn new(user: &'a str) -> Self {
        Self {
            system: None,
            user,
            model: DETECTION_MODEL,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }

    pub fn with_system(mut self, system: &'a str) -> Self {
        self.system = Some(system);
        self
    }

    pub fn with_model(mut self, model: &'a str) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Text-completion capability. Returns the raw free-form completion; callers
/// extract whatever structure they expect from it.
pub trait Oracle {
    fn complete(
        &self,
        call: OracleCall<'_>,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// Best-effort whole-text rewriting service. Failures are never fatal to the
/// caller; the humanization loop falls back to the original text.
pub trait BulkHumanizer {
    fn humanize(&self, text: &str) -> impl Future<Output = Result<String, OracleError>> + Send;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Client for the OpenAI-compatible chat-completions gateway.
pub struct GatewayClient {
    client: Client,
    url: String,
    api_key: String,
}

impl GatewayClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let url = env::var("GATEWAY_API_URL").unwrap_or_else(|_| GATEWAY_DEFAULT_URL.to_string());
        Self {
            client: Client::new(),
            url,
            api_key: api_key.into(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// The core imposes no request deadline of its own; callers that need one
    /// opt in here.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Client::builder().timeout(timeout).build() {
            Ok(client) => self.client = client,
            Err(err) => warn!(
                "[GATEWAY] failed to apply request timeout, keeping previous client: {}",
                err
            ),
        }
        self
    }
}

impl Oracle for GatewayClient {
    async fn complete(&self, call: OracleCall<'_>) -> Result<String, OracleError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = call.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: call.user.to_string(),
        });

        let request = ChatRequest {
            model: call.model.to_string(),
            messages,
            max_tokens: call.max_tokens,
            temperature: call.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let data: ChatResponse = response.json().await?;

        data.choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(OracleError::MissingContent)
    }
}

/// Client for the standalone humanizer API. The service has been observed to
/// return the rewritten text under several field names.
pub struct HumanizeApiClient {
    client: Client,
    url: String,
    api_key: String,
}

impl HumanizeApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let url =
            env::var("HUMANIZEAI_API_URL").unwrap_or_else(|_| HUMANIZER_DEFAULT_URL.to_string());
        Self {
            client: Client::new(),
            url,
            api_key: api_key.into(),
        }
    }
}

impl BulkHumanizer for HumanizeApiClient {
    async fn humanize(&self, text: &str) -> Result<String, OracleError> {
        let request = serde_json::json!({
            "text": text,
            "mode": "ultra",
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let data: serde_json::Value = response.json().await?;

        ["humanizedText", "text", "result"]
            .iter()
            .find_map(|field| data.get(*field).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .ok_or(OracleError::MissingContent)
    }
}

/// Placeholder for callers with no bulk humanizer configured: lets
/// `Option::<&()>::None` satisfy the type parameter.
impl BulkHumanizer for () {
    async fn humanize(&self, _text: &str) -> Result<String, OracleError> {
        Err(OracleError::MissingContent)
    }
}

/// Get an API key from the environment or the config file.
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys = match provider {
        "gateway" => vec!["GATEWAY_API_KEY", "MIROWRITE_GATEWAY_API_KEY", "LOVABLE_API_KEY"],
        "humanizeai" => vec!["HUMANIZEAI_API_KEY", "MIROWRITE_HUMANIZEAI_API_KEY"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}
