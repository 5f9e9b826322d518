use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod fake;
pub mod openai;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&[String]>)
        -> anyhow::Result<LlmResponse>;

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}
