use super::{LlmClient, LlmResponse};
use async_trait::async_trait;

/// Offline client returning a fixed reply; used for dry runs and tests.
#[derive(Debug)]
pub struct FakeClient {
    model: String,
    fixed_response: Option<String>,
}

impl FakeClient {
    pub fn new(model: String) -> Self {
        Self {
            model,
            fixed_response: None,
        }
    }

    pub fn with_response(mut self, response: String) -> Self {
        self.fixed_response = Some(response);
        self
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(
        &self,
        _prompt: &str,
        _system: Option<&[String]>,
    ) -> anyhow::Result<LlmResponse> {
        let text = self.fixed_response.clone().unwrap_or_else(|| {
            r#"{"tool_correctness": 5, "task_completion": 5, "communication": 5, "safety": 5, "retrieval_fit": 5, "rationale": "fake judge"}"#
                .to_string()
        });

        Ok(LlmResponse {
            text,
            provider: "fake".to_string(),
            model: self.model.clone(),
            meta: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
