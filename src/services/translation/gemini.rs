use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::config::ApiConfig;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::{TranslatedItem, TranslationRequest};
use crate::services::translation::Translator;
use crate::utils::Metrics;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` client that asks for a JSON array of `{text, index}`
pub struct GeminiTranslator {
    api_key: Option<String>,
    base_url: String,
    model: String,
    enable_thinking: bool,
    http_client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl GeminiTranslator {
    /// Create a client from API configuration.
    ///
    /// A missing key is not an error here; it surfaces on the first translate call.
    pub fn new(api: &ApiConfig, metrics: Option<Metrics>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(api.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: api.api_key.clone(),
            base_url: GEMINI_API_BASE.to_string(),
            model: api.translation_model.clone(),
            enable_thinking: api.enable_thinking,
            http_client,
            metrics,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Point the client at another `.../models` root, e.g. a proxy
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // The key travels in the x-goog-api-key header, never in the URL
    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }

    /// Natural-language instruction with the items enumerated one per line
    pub fn build_prompt(request: &TranslationRequest) -> String {
        let mut prompt = format!(
            "You are an expert translator. \
             Translate the text below to {}, \
             return everything in the same order and do not add anything else or change the numbers:\n",
            request.target_language
        );

        for (index, text) in request.items.iter().enumerate() {
            // JSON string literal keeps embedded quotes and newlines unambiguous
            prompt.push_str(&format!("{}. {}\n", index, Value::String(text.clone())));
        }

        prompt
    }

    /// Structured output schema: an array of `{text, index}` objects
    pub fn response_schema() -> Value {
        serde_json::json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "index": {"type": "integer"}
                },
                "required": ["text", "index"]
            }
        })
    }

    pub fn build_request_body(request: &TranslationRequest, enable_thinking: bool) -> Value {
        let mut body = serde_json::json!({
            "contents": [{
                "parts": [{"text": Self::build_prompt(request)}]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": Self::response_schema()
            }
        });

        if !enable_thinking {
            body["generationConfig"]["thinkingConfig"] = serde_json::json!({
                "thinking_budget": 0
            });
        }

        body
    }

    /// Pull the translated items out of a raw `generateContent` response body
    pub fn parse_response(body: &str) -> TranslationResult<Vec<TranslatedItem>> {
        let response: Value = serde_json::from_str(body)
            .map_err(|e| TranslationError::malformed(format!("response is not JSON: {}", e)))?;

        let Some(content) = response["candidates"][0]["content"]["parts"][0]["text"].as_str() else {
            let reason = response["promptFeedback"]["blockReason"]
                .as_str()
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "missing candidates[0].content.parts[0].text".to_string());
            return Err(TranslationError::malformed(reason));
        };

        serde_json::from_str::<Vec<TranslatedItem>>(content).map_err(|e| {
            TranslationError::malformed(format!("translation payload is not a {{text, index}} array: {}", e))
        })
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    #[instrument(skip(self, request), fields(items = request.len(), target = %request.target_language))]
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<Vec<TranslatedItem>> {
        let api_key = self.api_key.as_deref().ok_or(TranslationError::MissingApiKey)?;
        let body = Self::build_request_body(request, self.enable_thinking);

        info!("Sent translation prompt to {}, waiting for a response...", self.model);
        let start = Instant::now();

        let result = async {
            let response = self
                .http_client
                .post(self.endpoint())
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let text = response.text().await.map_err(transport_error)?;

            if !status.is_success() {
                return Err(TranslationError::ServiceFailure {
                    status: status.as_u16(),
                    body: text,
                });
            }

            Ok::<_, TranslationError>(text)
        }
        .await;

        let duration = start.elapsed();

        let response_text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!("Translation request failed after {:?}: {}", duration, e);
                if let Some(ref m) = self.metrics {
                    m.record_api_call(false, duration, 0, 0);
                }
                return Err(e);
            }
        };

        let (input_tokens, output_tokens) = extract_token_usage(&response_text);
        let parsed = Self::parse_response(&response_text);

        if let Some(ref m) = self.metrics {
            m.record_api_call(parsed.is_ok(), duration, input_tokens, output_tokens);
        }

        let items = parsed?;
        debug!(
            "Response received in {:.2}s: {} items for {} requested",
            duration.as_secs_f64(),
            items.len(),
            request.len()
        );

        Ok(items)
    }
}

/// Wrap a reqwest failure without the request URL so it is safe to log and return
fn transport_error(e: reqwest::Error) -> TranslationError {
    TranslationError::Transport(e.without_url())
}

/// Extract token usage from a Gemini API response
///
/// Returns (input_tokens, output_tokens) if available, otherwise (0, 0)
fn extract_token_usage(body: &str) -> (u64, u64) {
    let Ok(response) = serde_json::from_str::<Value>(body) else {
        return (0, 0);
    };
    let usage_metadata = &response["usageMetadata"];
    let input_tokens = usage_metadata["promptTokenCount"].as_u64().unwrap_or(0);
    let output_tokens = usage_metadata["candidatesTokenCount"].as_u64().unwrap_or(0);

    (input_tokens, output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(items: &[&str]) -> TranslationRequest {
        TranslationRequest {
            target_language: "English".to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn wrap(payload: &str) -> String {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": payload}]}}],
            "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 7}
        })
        .to_string()
    }

    #[test]
    fn test_prompt_enumerates_items_in_order() {
        let prompt = GeminiTranslator::build_prompt(&request(&["Spiel starten", "Er sagte \"Hallo\""]));

        assert!(prompt.contains("Translate the text below to English"));
        assert!(prompt.contains("0. \"Spiel starten\"\n"));
        assert!(prompt.contains("1. \"Er sagte \\\"Hallo\\\"\"\n"));
        assert!(prompt.find("0. ").unwrap() < prompt.find("1. ").unwrap());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GeminiTranslator::build_request_body(&request(&["a"]), false);
        assert_eq!(body["generationConfig"]["response_mime_type"], "application/json");
        assert_eq!(body["generationConfig"]["response_schema"]["type"], "array");
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinking_budget"], 0);

        let body = GeminiTranslator::build_request_body(&request(&["a"]), true);
        assert!(body["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn test_parse_structured_response() {
        let body = wrap(r#"[{"text":"Start game","index":0},{"text":"He said hello","index":1}]"#);
        let items = GeminiTranslator::parse_response(&body).unwrap();

        assert_eq!(
            items,
            vec![
                TranslatedItem::with_index("Start game", 0),
                TranslatedItem::with_index("He said hello", 1),
            ]
        );
        assert_eq!(extract_token_usage(&body), (42, 7));
    }

    #[test]
    fn test_parse_rejects_non_json_body() {
        let err = GeminiTranslator::parse_response("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_parse_rejects_missing_text_field() {
        let body = wrap(r#"[{"index":0}]"#);
        assert!(GeminiTranslator::parse_response(&body).unwrap_err().is_malformed());

        let body = serde_json::json!({"candidates": []}).to_string();
        assert!(GeminiTranslator::parse_response(&body).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_reports_blocked_prompt() {
        let body = serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        let err = GeminiTranslator::parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let api = ApiConfig {
            api_key: None,
            translation_model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(1),
            enable_thinking: false,
        };
        let translator = GeminiTranslator::new(&api, None).unwrap();

        let err = translator.translate(&request(&["Hallo"])).await.unwrap_err();
        assert!(matches!(err, TranslationError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_api_key() {
        let api = ApiConfig {
            api_key: Some("SECRET-KEY-123".to_string()),
            translation_model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(2),
            enable_thinking: false,
        };
        let metrics = Metrics::new();
        // Nothing listens on port 1, so the connection is refused locally
        let translator = GeminiTranslator::new(&api, Some(metrics.clone()))
            .unwrap()
            .with_base_url("http://127.0.0.1:1/v1beta/models");

        let err = translator.translate(&request(&["Hallo"])).await.unwrap_err();
        assert!(matches!(err, TranslationError::Transport(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
        assert_eq!(metrics.snapshot().api_calls_failed, 1);
    }

    #[test]
    fn test_endpoint_has_no_key() {
        let api = ApiConfig {
            api_key: Some("SECRET-KEY-123".to_string()),
            translation_model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(1),
            enable_thinking: false,
        };
        let translator = GeminiTranslator::new(&api, None).unwrap();
        assert_eq!(
            translator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
