use super::AggregationSink;
use crate::model::SessionAggregation;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Writes one pretty JSON snapshot per session: `<dir>/<session_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(session_id)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Session ids come from upstream systems; keep them from escaping the export dir.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

impl AggregationSink for JsonExporter {
    fn name(&self) -> &'static str {
        "json-export"
    }

    fn upsert(&self, aggregation: &SessionAggregation) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create export dir {}", self.dir.display()))?;
        let path = self.path_for(&aggregation.session_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(aggregation)?)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_cannot_escape_dir() {
        let exporter = JsonExporter::new("/tmp/out");
        assert_eq!(
            exporter.path_for("../../etc/passwd"),
            PathBuf::from("/tmp/out/_.._etc_passwd.json")
        );
        assert_eq!(
            exporter.path_for("sess-42"),
            PathBuf::from("/tmp/out/sess-42.json")
        );
    }
}
