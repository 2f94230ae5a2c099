use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::ModelInvoker;
use crate::config::Config;
use crate::error::CalculateError;
use crate::normalize::NormalizedImage;

const USER_AGENT: &str = "sketch-semantics-api/0.1";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Calls Gemini's `generateContent` endpoint once per request.
pub struct GeminiInvoker {
    api_key: Option<String>,
    model: String,
    api_base: String,
    timeout: Option<Duration>,
}

impl GeminiInvoker {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            timeout: config.upstream_timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl ModelInvoker for GeminiInvoker {
    async fn invoke(&self, prompt: &str, image: &NormalizedImage) -> Result<String, CalculateError> {
        let body = GenerateContentRequest::new(prompt, &image.to_png()?);

        // A fresh client per call: no connection state outlives the request.
        let mut builder = reqwest::ClientBuilder::new().user_agent(USER_AGENT);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CalculateError::Upstream(e.to_string()))?;

        let mut request = client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CalculateError::Upstream(format!("TimeoutError: {}", e))
            } else if e.is_connect() {
                CalculateError::Upstream(format!("ConnectError: {}", e))
            } else {
                CalculateError::Upstream(format!("RequestError: {}", e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CalculateError::Upstream(e.to_string()))?;

        if !status.is_success() {
            return Err(CalculateError::Upstream(provider_message(status, &text)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            CalculateError::Upstream(format!("Unexpected response from model provider: {}", e))
        })?;

        let completion = parsed.completion_text();
        if completion.is_empty() {
            tracing::warn!(model = %self.model, "model returned no text");
        }
        Ok(completion)
    }
}

/// The provider's own error message when the body is a Google error
/// envelope, otherwise the status line and raw body.
fn provider_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Model provider returned {}: {}", status, body.trim()))
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn new(prompt: &str, png: &[u8]) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: STANDARD.encode(png),
                        },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, joined.
    fn completion_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_prompt_then_png() {
        let body = serde_json::to_value(GenerateContentRequest::new("solve", b"\x89PNG")).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        {"text": "solve"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw=="}}
                    ]
                }]
            })
        );
    }

    #[test]
    fn endpoint_includes_model() {
        let config = Config::from_lookup(|key| match key {
            "GEMINI_MODEL" => Some("gemini-test".to_string()),
            "GEMINI_API_BASE" => Some("http://127.0.0.1:1/v1beta".to_string()),
            _ => None,
        })
        .unwrap();
        let invoker = GeminiInvoker::from_config(&config);
        assert_eq!(
            invoker.endpoint(),
            "http://127.0.0.1:1/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn completion_joins_first_candidate_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "[{'expr': "}, {"text": "'1+1', 'result': 2}]"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.completion_text(), "[{'expr': '1+1', 'result': 2}]");
    }

    #[test]
    fn blocked_response_has_empty_completion() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(response.completion_text(), "");

        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert_eq!(response.completion_text(), "");
    }

    #[test]
    fn provider_message_prefers_google_error_text() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(
            provider_message(reqwest::StatusCode::BAD_REQUEST, body),
            "API key not valid. Please pass a valid API key."
        );
    }

    #[test]
    fn provider_message_falls_back_to_status_and_body() {
        assert_eq!(
            provider_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n"),
            "Model provider returned 502 Bad Gateway: upstream down"
        );
    }
}
