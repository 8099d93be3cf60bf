use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LLMProvider {
    #[serde(rename = "ollama")]
    Ollama,
    /// Any server speaking the OpenAI chat-completions protocol.
    #[serde(rename = "openai")]
    OpenAiCompatible,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    #[validate(url)]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub model: String,
    pub api_key: Option<String>,
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            max_tokens: Some(512),
            temperature: Some(0.1),
        }
    }
}
