use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub version: u32,
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            judge: JudgeSettings::default(),
            storage: StorageSettings::default(),
            pricing: PricingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JudgeProvider {
    Openai,
    Fake,
    /// No oracle: every trace goes through the rule-based evaluator.
    #[default]
    None,
}

impl std::str::FromStr for JudgeProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(JudgeProvider::Openai),
            "fake" => Ok(JudgeProvider::Fake),
            "none" | "off" => Ok(JudgeProvider::None),
            other => Err(ConfigError::Invalid(format!(
                "unknown judge provider '{}' (expected openai, fake or none)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
    pub provider: JudgeProvider,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    /// Maximum oracle calls in flight.
    pub concurrency: usize,
    /// Reply returned by the `fake` provider.
    pub fixed_reply: Option<String>,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            provider: JudgeProvider::None,
            model: None,
            temperature: 0.0,
            max_tokens: 512,
            timeout_ms: 30_000,
            concurrency: 5,
            fixed_reply: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

/// Unit prices per token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    pub default: Option<UnitPrice>,
    pub models: BTreeMap<String, UnitPrice>,
}

pub fn load_config(path: &Path) -> Result<EvalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<EvalConfig, ConfigError> {
    let mut cfg: EvalConfig = serde_yaml::from_str(raw)?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: cfg.version,
            supported: SUPPORTED_CONFIG_VERSION,
        });
    }
    cfg.judge.concurrency = cfg.judge.concurrency.max(1);
    for (model, price) in &cfg.pricing.models {
        if price.input < 0.0 || price.output < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "negative unit price for model '{}'",
                model
            )));
        }
    }
    Ok(cfg)
}
