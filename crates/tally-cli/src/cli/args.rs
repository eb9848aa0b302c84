use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Append-only benchmark snapshot store with regression gating"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Init(InitArgs),
    Ingest(IngestArgs),
    Get(GetArgs),
    Query(QueryArgs),
    Latest(LatestArgs),
    Trend(TrendArgs),
    Compare(CompareArgs),
    Models(ModelsArgs),
    Stats(StatsArgs),
    Version,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    /// Where to write the sample policy file
    #[arg(long, default_value = "tally.yaml")]
    pub config: PathBuf,

    /// Overwrite an existing policy file
    #[arg(long)]
    pub force: bool,

    /// Also write a .gitignore entry for the local store
    #[arg(long)]
    pub gitignore: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    /// Snapshot document (JSON); use '-' to read stdin
    #[arg(long, default_value = "-")]
    pub file: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GetArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    /// Snapshot id
    pub id: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    #[arg(long)]
    pub model: Option<String>,

    /// local|staging|production|ci
    #[arg(long)]
    pub env: Option<String>,

    #[arg(long)]
    pub branch: Option<String>,

    /// Lower bound on created_at (RFC 3339, inclusive)
    #[arg(long)]
    pub since: Option<String>,

    /// Upper bound on created_at (RFC 3339, inclusive)
    #[arg(long)]
    pub until: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LatestArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    #[arg(long)]
    pub model: String,

    /// local|staging|production|ci
    #[arg(long)]
    pub env: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TrendArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    #[arg(long)]
    pub model: String,

    #[arg(long)]
    pub metric: String,

    /// local|staging|production|ci
    #[arg(long)]
    pub env: String,

    #[arg(long)]
    pub since: Option<String>,

    #[arg(long)]
    pub until: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    /// Baseline snapshot id
    pub baseline: String,

    /// Candidate snapshot id
    pub candidate: String,

    /// Per-metric detection policy file (YAML)
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Reject unknown keys in the policy file
    #[arg(long)]
    pub strict: bool,

    /// Exit non-zero when any metric regresses
    #[arg(long)]
    pub fail_on_regression: bool,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ModelsArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,

    /// local|staging|production|ci
    #[arg(long)]
    pub env: String,

    /// Cut-off: latest snapshot at or before this time (RFC 3339)
    #[arg(long)]
    pub at: Option<String>,

    /// Model to include (repeatable)
    #[arg(long = "model", required = true)]
    pub model: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long, default_value = ".tally/tally.db")]
    pub db: PathBuf,
}
