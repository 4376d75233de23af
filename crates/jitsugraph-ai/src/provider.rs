use async_trait::async_trait;
use jitsugraph_core::Result;
use serde::{Deserialize, Serialize};

/// Parameters for one generative call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model override; the provider's configured default when `None`.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional system instruction prepended to the conversation.
    pub system_instruction: Option<String>,
    /// Request structured JSON output instead of free text.
    pub json_output: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.25,
            system_instruction: None,
            json_output: false,
        }
    }
}

impl GenerationConfig {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// The opaque generative capability the pipeline consumes: produce text or
/// JSON given prompt parts, and produce a vector given text. The service is
/// untrusted; callers validate its output against their own contracts.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Generate free text from ordered prompt parts.
    async fn generate(&self, parts: &[&str], config: &GenerationConfig) -> Result<String>;

    /// Generate structured output. Implementations request JSON from the
    /// service and parse the returned text; malformed output is an error.
    async fn generate_json(
        &self,
        parts: &[&str],
        config: &GenerationConfig,
    ) -> Result<serde_json::Value> {
        let text = self.generate(parts, &config.clone().json()).await?;
        let value = serde_json::from_str(strip_code_fences(&text))?;
        Ok(value)
    }

    /// Embed a paragraph of text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Some services wrap JSON answers in markdown code fences even when asked
/// for raw JSON.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
