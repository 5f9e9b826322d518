use crate::cli::args::JudgeArgs;
use std::sync::Arc;
use std::time::Duration;
use tribunal_core::config::{JudgeProvider, JudgeSettings};
use tribunal_core::judge::{JudgeOracle, LlmJudge, ScriptedOracle, TraceEvaluator, TraceEvaluatorConfig};
use tribunal_core::providers::llm::fake::FakeClient;
use tribunal_core::providers::llm::openai::OpenAIClient;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// CLI flags override the `judge` config section.
pub fn build_evaluator(settings: &JudgeSettings, args: &JudgeArgs) -> anyhow::Result<TraceEvaluator> {
    let config = TraceEvaluatorConfig {
        timeout: Duration::from_millis(settings.timeout_ms),
        concurrency: settings.concurrency.max(1),
    };
    let oracle = build_oracle(settings, args)?;
    match &oracle {
        Some(o) => tracing::info!(
            oracle = %o.identity(),
            concurrency = config.concurrency,
            timeout_ms = settings.timeout_ms,
            "judge oracle configured"
        ),
        None => tracing::info!("no judge oracle; rule-based scoring only"),
    }
    Ok(TraceEvaluator::new(oracle, config))
}

fn build_oracle(
    settings: &JudgeSettings,
    args: &JudgeArgs,
) -> anyhow::Result<Option<Arc<dyn JudgeOracle>>> {
    if let Some(path) = &args.judge_replies {
        return Ok(Some(Arc::new(ScriptedOracle::from_json_file(path)?)));
    }

    let provider = match &args.judge {
        Some(raw) => raw.parse::<JudgeProvider>()?,
        None => settings.provider,
    };
    let model = args.judge_model.clone().or_else(|| settings.model.clone());

    let oracle: Option<Arc<dyn JudgeOracle>> = match provider {
        JudgeProvider::None => None,
        JudgeProvider::Fake => {
            let mut client = FakeClient::new(model.unwrap_or_else(|| "fake-judge".to_string()));
            if let Some(reply) = &settings.fixed_reply {
                client = client.with_response(reply.clone());
            }
            Some(Arc::new(LlmJudge::new(Arc::new(client))))
        }
        JudgeProvider::Openai => {
            let key = args.judge_api_key.clone().ok_or_else(|| {
                anyhow::anyhow!("judge provider is openai but OPENAI_API_KEY is not set")
            })?;
            let mut client = OpenAIClient::new(
                model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                key,
                settings.temperature,
                settings.max_tokens,
            );
            if let Some(url) = &args.judge_base_url {
                client = client.with_base_url(url.clone());
            }
            Some(Arc::new(LlmJudge::new(Arc::new(client))))
        }
    };
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_overrides_config_provider() {
        let settings = JudgeSettings {
            provider: JudgeProvider::Fake,
            ..Default::default()
        };
        let args = JudgeArgs {
            judge: Some("none".into()),
            ..Default::default()
        };
        let evaluator = build_evaluator(&settings, &args).unwrap();
        assert!(evaluator.oracle_identity().is_none());
    }

    #[test]
    fn fake_provider_uses_model_name() {
        let settings = JudgeSettings {
            provider: JudgeProvider::Fake,
            model: Some("judge-x".into()),
            ..Default::default()
        };
        let evaluator = build_evaluator(&settings, &JudgeArgs::default()).unwrap();
        assert_eq!(evaluator.oracle_identity().as_deref(), Some("fake:judge-x"));
    }

    #[test]
    fn openai_without_key_is_a_config_error() {
        let settings = JudgeSettings {
            provider: JudgeProvider::Openai,
            ..Default::default()
        };
        let err = build_evaluator(&settings, &JudgeArgs::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let args = JudgeArgs {
            judge: Some("oracle9000".into()),
            ..Default::default()
        };
        assert!(build_evaluator(&JudgeSettings::default(), &args).is_err());
    }
}
