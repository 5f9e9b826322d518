use super::{emit_json, load_optional_config};
use crate::cli::args::EvaluateArgs;
use crate::exit_codes::SUCCESS;
use std::sync::Arc;
use tribunal_core::aggregate::SessionAggregator;
use tribunal_core::pipeline::EvaluationPipeline;
use tribunal_core::report::print_summary;
use tribunal_core::storage::{JsonExporter, Store};
use tribunal_core::trace::read_traces;

pub async fn run(args: EvaluateArgs) -> anyhow::Result<i32> {
    let cfg = load_optional_config(args.config.as_deref())?;
    let traces = read_traces(&args.traces)?;
    tracing::info!(count = traces.len(), path = %args.traces.display(), "traces loaded");

    let evaluator = super::judge_builder::build_evaluator(&cfg.judge, &args.judge)?;

    let mut aggregator = SessionAggregator::new();
    let db_path = args.db.clone().or_else(|| cfg.storage.db_path.clone());
    let store = match db_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let store = Store::open(&path)?;
            store.init_schema()?;
            aggregator = aggregator.with_sink(Arc::new(store.clone()));
            Some(store)
        }
        None => None,
    };
    if let Some(dir) = args.export_dir.clone().or_else(|| cfg.storage.export_dir.clone()) {
        aggregator = aggregator.with_sink(Arc::new(JsonExporter::new(dir)));
    }

    let mut pipeline = EvaluationPipeline::new(evaluator, Arc::new(aggregator));
    if let Some(store) = store {
        pipeline = pipeline.with_store(store);
    }

    let output = pipeline.run(traces).await;
    print_summary(&output, args.verbose);
    emit_json(&output, args.out.as_deref())?;
    Ok(SUCCESS)
}
