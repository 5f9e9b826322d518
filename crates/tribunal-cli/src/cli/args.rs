use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Offline evaluation of conversational agent sessions: judged scoring, safety scans, performance rollups"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Score traces, aggregate sessions, persist results
    Evaluate(EvaluateArgs),
    /// Pattern-based safety scan of recorded responses
    Safety(SafetyArgs),
    /// Replay performance events into a latency/cost report
    Perf(PerfArgs),
    Version,
}

#[derive(Args, Clone, Debug)]
pub struct EvaluateArgs {
    /// InteractionTrace records, one JSON object per line
    #[arg(long)]
    pub traces: PathBuf,

    #[arg(long, env = "TRIBUNAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database (overrides storage.db_path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Directory for per-session JSON snapshots (overrides storage.export_dir)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Write the full result here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub judge: JudgeArgs,

    /// Print per-category averages and dispersion
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct JudgeArgs {
    /// judge provider (openai|fake|none); overrides judge.provider
    #[arg(long, env = "TRIBUNAL_JUDGE")]
    pub judge: Option<String>,

    #[arg(long, env = "TRIBUNAL_JUDGE_MODEL")]
    pub judge_model: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub judge_api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[arg(long, env = "TRIBUNAL_JUDGE_BASE_URL")]
    pub judge_base_url: Option<String>,

    /// Replay recorded judge replies (JSON object: trace id -> reply) instead of calling a provider
    #[arg(long, conflicts_with = "judge")]
    pub judge_replies: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct SafetyArgs {
    /// Records `{id, input?, response, should_refuse?, should_escalate?}`, one per line
    #[arg(long)]
    pub responses: PathBuf,

    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct PerfArgs {
    /// Performance events, one per line
    #[arg(long)]
    pub events: PathBuf,

    /// Config supplying `pricing`
    #[arg(long, env = "TRIBUNAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub out: Option<PathBuf>,
}
