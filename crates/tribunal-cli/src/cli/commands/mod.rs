pub mod dispatch;
pub mod evaluate;
pub mod judge_builder;
pub mod perf;
pub mod safety;

pub use dispatch::dispatch;

use std::path::Path;
use tribunal_core::config::{load_config, EvalConfig};

/// Config file if given, defaults otherwise.
pub(crate) fn load_optional_config(path: Option<&Path>) -> anyhow::Result<EvalConfig> {
    match path {
        Some(p) => {
            let cfg = load_config(p)?;
            tracing::info!(path = %p.display(), "loaded config");
            Ok(cfg)
        }
        None => Ok(EvalConfig::default()),
    }
}

/// JSON to `out` when given, stdout otherwise.
pub(crate) fn emit_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            tribunal_core::report::write_json(value, path)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{}", tribunal_core::report::to_pretty_json(value)?),
    }
    Ok(())
}
