use crate::provider::{GenerationConfig, GenerativeProvider};
use async_trait::async_trait;
use jitsugraph_core::{JitsuGraphError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini generative + embedding provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(JitsuGraphError::Configuration(
                "Gemini API key is required. Set GEMINI_API_KEY environment variable.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("JitsuGraph/0.1")
            .build()
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::default())
    }

    async fn post_with_retry<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: for<'de> Deserialize<'de>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(250 * 2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                warn!(
                    "Gemini request failed (attempt {}/{}), retrying",
                    attempt,
                    self.config.max_retries
                );
            }

            match self.try_post(url, request).await {
                Ok(response) => return Ok(response),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| JitsuGraphError::Network("all retry attempts failed".to_string())))
    }

    async fn try_post<Req, Resp>(&self, url: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(JitsuGraphError::Network(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| JitsuGraphError::Network(format!("malformed Gemini response: {}", e)))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate(&self, parts: &[&str], config: &GenerationConfig) -> Result<String> {
        let model = config.model.as_deref().unwrap_or(&self.config.model);
        let url = format!("{}/models/{}:generateContent", self.config.api_base, model);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: parts
                    .iter()
                    .map(|p| Part {
                        text: (*p).to_string(),
                    })
                    .collect(),
            }],
            system_instruction: config.system_instruction.as_ref().map(|text| Content {
                parts: vec![Part { text: text.clone() }],
            }),
            generation_config: RequestGenerationConfig {
                temperature: config.temperature,
                response_mime_type: config
                    .json_output
                    .then(|| "application/json".to_string()),
            },
        };

        debug!(model, parts = parts.len(), "sending generateContent request");
        let response: GenerateResponse = self.post_with_retry(&url, &request).await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(JitsuGraphError::Network(
                "Gemini returned no candidates".to_string(),
            ));
        }
        Ok(text)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent",
            self.config.api_base, self.config.embedding_model
        );

        let request = EmbedRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response: EmbedResponse = self.post_with_retry(&url, &request).await?;
        if response.embedding.values.is_empty() {
            return Err(JitsuGraphError::Network(
                "Gemini returned an empty embedding".to_string(),
            ));
        }
        Ok(response.embedding.values)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = GeminiConfig {
            api_key: String::new(),
            ..GeminiConfig::default()
        };
        let err = GeminiProvider::new(config).err().unwrap();
        assert!(matches!(err, JitsuGraphError::Configuration(_)));
    }

    #[test]
    fn generate_request_serializes_gemini_wire_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "hello".to_string(),
                }],
            }],
            system_instruction: None,
            generation_config: RequestGenerationConfig {
                temperature: 0.25,
                response_mime_type: Some("application/json".to_string()),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn generate_response_parses_candidate_text() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "frame and shrimp"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.candidates[0].content.as_ref().unwrap().parts[0].text,
            "frame and shrimp"
        );
    }

    #[test]
    fn embed_response_parses_values() {
        let raw = r#"{"embedding": {"values": [0.1, -0.2, 0.3]}}"#;
        let response: EmbedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.embedding.values.len(), 3);
    }
}
