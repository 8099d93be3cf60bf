pub mod ollama;
pub mod openai_compat;

use crate::domain::error::Result;
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use async_trait::async_trait;
use ollama::OllamaClient;
use openai_compat::OpenAiCompatClient;

#[async_trait]
pub trait LLMClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String>;
}

pub struct RouterClient {
    ollama: OllamaClient,
    openai: OpenAiCompatClient,
}

impl RouterClient {
    pub fn new() -> Self {
        Self {
            ollama: OllamaClient::new(),
            openai: OpenAiCompatClient::new(),
        }
    }
}

impl Default for RouterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        match config.provider {
            LLMProvider::Ollama => self.ollama.generate(config, system, user).await,
            LLMProvider::OpenAiCompatible => self.openai.generate(config, system, user).await,
        }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}{}", base_url, path)
    } else {
        format!("{}/{}", base_url, path)
    }
}
