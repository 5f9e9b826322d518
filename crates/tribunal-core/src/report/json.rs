use anyhow::Context;
use serde::Serialize;
use std::path::Path;

pub fn to_pretty_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn write_json<T: Serialize>(value: &T, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, to_pretty_json(value)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}
