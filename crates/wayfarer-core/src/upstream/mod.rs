//! Upstream model client: the DashScope text-generation endpoint.
//!
//! [`TextGenerator`] is the seam the HTTP handlers program against; the
//! per-user API key is always passed in explicitly rather than read from
//! ambient state, which also makes a scripted stub trivial in tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Default DashScope service root.
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1/services";

/// Default text-generation model.
pub const DEFAULT_MODEL: &str = "qwen-turbo";

/// Fixed timeout on the outbound call; the handling request waits on it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-call generation parameters. Each call site has its own preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub result_format: Option<&'static str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    /// Itinerary generation.
    pub const PLAN: Self = Self {
        result_format: Some("json"),
        max_tokens: 4000,
        temperature: 0.7,
    };

    /// API-key probe: the cheapest possible request.
    pub const KEY_PROBE: Self = Self {
        result_format: None,
        max_tokens: 10,
        temperature: 0.0,
    };

    /// Trip extraction from free-form text.
    pub const VOICE_EXTRACTION: Self = Self {
        result_format: Some("json"),
        max_tokens: 1000,
        temperature: 0.3,
    };

    /// Budget analysis.
    pub const BUDGET_ANALYSIS: Self = Self {
        result_format: Some("json"),
        max_tokens: 2000,
        temperature: 0.7,
    };
}

/// Classified failures from the upstream call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream request timed out")]
    Timeout,

    #[error("could not connect to upstream")]
    Connect,

    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// The upstream HTTP status, when the failure carries one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Object-safe interface to a text-generation backend.
///
/// Returns the raw response envelope; payload extraction belongs to
/// [`crate::normalize`], not the transport.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Value, UpstreamError>;
}

// Compile-time assertion: TextGenerator must stay object-safe so it can be
// stored as `Arc<dyn TextGenerator>` in the server state.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};

/// reqwest-backed DashScope client.
#[derive(Debug, Clone)]
pub struct DashScopeClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl DashScopeClient {
    /// Build a client for the given service root and model.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(UpstreamError::from_reqwest)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn generation_url(&self) -> String {
        format!(
            "{}/aigc/text-generation/generation",
            self.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, prompt: &str, params: GenerationParams) -> Value {
        let mut parameters = serde_json::Map::new();
        if let Some(format) = params.result_format {
            parameters.insert("result_format".to_owned(), json!(format));
        }
        parameters.insert("max_tokens".to_owned(), json!(params.max_tokens));
        parameters.insert("temperature".to_owned(), json!(params.temperature));

        json!({
            "model": self.model,
            "input": { "prompt": prompt },
            "parameters": parameters,
        })
    }
}

#[async_trait]
impl TextGenerator for DashScopeClient {
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Value, UpstreamError> {
        let started = Instant::now();

        let response = self
            .http
            .post(self.generation_url())
            .bearer_auth(api_key)
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate(&body, 300),
                "upstream generation returned an error status"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope = response
            .json::<Value>()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            model = %self.model,
            "upstream generation succeeded"
        );
        Ok(envelope)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_params_match_generation_call_site() {
        let params = GenerationParams::PLAN;
        assert_eq!(params.result_format, Some("json"));
        assert_eq!(params.max_tokens, 4000);
        assert_eq!(params.temperature, 0.7);
    }

    #[test]
    fn probe_params_are_minimal() {
        let params = GenerationParams::KEY_PROBE;
        assert_eq!(params.result_format, None);
        assert_eq!(params.max_tokens, 10);
        assert_eq!(params.temperature, 0.0);
    }

    #[test]
    fn request_body_shape() {
        let client = DashScopeClient::new(DEFAULT_BASE_URL, "qwen-turbo").unwrap();
        let body = client.request_body("hello", GenerationParams::PLAN);

        assert_eq!(body["model"], "qwen-turbo");
        assert_eq!(body["input"]["prompt"], "hello");
        assert_eq!(body["parameters"]["result_format"], "json");
        assert_eq!(body["parameters"]["max_tokens"], 4000);
    }

    #[test]
    fn request_body_omits_absent_result_format() {
        let client = DashScopeClient::new(DEFAULT_BASE_URL, "qwen-turbo").unwrap();
        let body = client.request_body("ping", GenerationParams::KEY_PROBE);
        assert!(body["parameters"].get("result_format").is_none());
        assert_eq!(body["parameters"]["max_tokens"], 10);
    }

    #[test]
    fn generation_url_joins_cleanly() {
        let client = DashScopeClient::new("http://localhost:9999/", "m").unwrap();
        assert_eq!(
            client.generation_url(),
            "http://localhost:9999/aigc/text-generation/generation"
        );
    }

    #[test]
    fn status_error_exposes_http_status() {
        let err = UpstreamError::Status {
            status: 429,
            body: String::new(),
        };
        assert_eq!(err.http_status(), Some(429));
        assert_eq!(UpstreamError::Timeout.http_status(), None);
    }
}
