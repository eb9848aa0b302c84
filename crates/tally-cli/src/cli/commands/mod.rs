use super::args::*;
use anyhow::Context;
use std::io::Read;
use std::path::Path;

use tally_core::history::History;
use tally_core::ingest::SnapshotDraft;
use tally_core::model::{parse_ts, Environment, SnapshotFilter, TimeRange};
use tally_core::storage::Store;

pub mod compare;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const REGRESSION: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => cmd_init(args),
        Command::Ingest(args) => cmd_ingest(args),
        Command::Get(args) => cmd_get(args),
        Command::Query(args) => cmd_query(args),
        Command::Latest(args) => cmd_latest(args),
        Command::Trend(args) => cmd_trend(args),
        Command::Compare(args) => compare::cmd_compare(args),
        Command::Models(args) => cmd_models(args),
        Command::Stats(args) => cmd_stats(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

pub(crate) fn open_store(db: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store =
        Store::open(db).with_context(|| format!("failed to open store at {}", db.display()))?;
    store.init_schema()?;
    Ok(store)
}

pub(crate) fn parse_env(raw: &str) -> anyhow::Result<Environment> {
    Environment::parse(raw).ok_or_else(|| {
        anyhow::anyhow!("invalid --env '{}' (expected local|staging|production|ci)", raw)
    })
}

pub(crate) fn parse_ts_arg(
    raw: &str,
    flag: &str,
) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    parse_ts(raw).ok_or_else(|| {
        anyhow::anyhow!(
            "invalid {} '{}' (expected RFC 3339, e.g. 2026-08-05T12:00:00Z)",
            flag,
            raw
        )
    })
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() && !args.force {
        eprintln!(
            "{} already exists (use --force to overwrite)",
            args.config.display()
        );
    } else {
        tally_core::config::write_sample_policies(&args.config)?;
        eprintln!("wrote {}", args.config.display());
    }

    if args.gitignore {
        write_file_if_missing(Path::new(".gitignore"), crate::templates::GITIGNORE)?;
    }
    Ok(exit_codes::OK)
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    if path.exists() {
        eprintln!("{} already exists, skipping", path.display());
        return Ok(());
    }
    std::fs::write(path, content)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_ingest(args: IngestArgs) -> anyhow::Result<i32> {
    let raw = if args.file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("failed to read {}", args.file))?
    };

    let draft = SnapshotDraft::from_json(&raw)?;
    let store = open_store(&args.db)?;
    let snap = store.append(&draft)?;

    eprintln!(
        "appended snapshot for model '{}' (seq {})",
        snap.model_name, snap.seq
    );
    println!("{}", snap.id);
    Ok(exit_codes::OK)
}

fn cmd_get(args: GetArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let snap = store.get(&args.id)?;
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(exit_codes::OK)
}

fn cmd_query(args: QueryArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let filter = SnapshotFilter {
        model_name: args.model.clone(),
        environment: args.env.as_deref().map(parse_env).transpose()?,
        branch_name: args.branch.clone(),
        range: TimeRange {
            since: args
                .since
                .as_deref()
                .map(|s| parse_ts_arg(s, "--since"))
                .transpose()?,
            until: args
                .until
                .as_deref()
                .map(|s| parse_ts_arg(s, "--until"))
                .transpose()?,
        },
    };
    let snapshots = store.query(&filter)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshots)?),
        OutputFormat::Text => {
            for s in &snapshots {
                println!(
                    "{:>4}  {}  {:<12} {:<10} {:<20} {} metric(s)",
                    s.seq,
                    s.id,
                    s.model_name,
                    s.environment,
                    s.branch_name,
                    s.metrics.len()
                );
            }
            eprintln!("{} snapshot(s)", snapshots.len());
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_latest(args: LatestArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let snap = store.latest(&args.model, parse_env(&args.env)?)?;
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(exit_codes::OK)
}

fn cmd_trend(args: TrendArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let history = History::new(store);
    let range = TimeRange {
        since: args
            .since
            .as_deref()
            .map(|s| parse_ts_arg(s, "--since"))
            .transpose()?,
        until: args
            .until
            .as_deref()
            .map(|s| parse_ts_arg(s, "--until"))
            .transpose()?,
    };
    let points = history.trend(&args.model, &args.metric, parse_env(&args.env)?, &range)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&points)?),
        OutputFormat::Text => {
            for p in &points {
                println!("{}  {}  {}", p.created_at.to_rfc3339(), p.value, p.snapshot_id);
            }
            if points.is_empty() {
                eprintln!(
                    "no data points for metric '{}' (model '{}', env '{}')",
                    args.metric, args.model, args.env
                );
            }
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_models(args: ModelsArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let history = History::new(store);
    let at = args
        .at
        .as_deref()
        .map(|s| parse_ts_arg(s, "--at"))
        .transpose()?;
    let latest = history.compare_models(&args.model, parse_env(&args.env)?, at)?;

    for m in &args.model {
        if !latest.contains_key(m) {
            eprintln!("note: no matching snapshot for model '{}'", m);
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&latest)?),
        OutputFormat::Text => {
            for (model, snap) in &latest {
                println!(
                    "{:<12} {}  {}  {} metric(s)",
                    model,
                    snap.id,
                    snap.created_at.to_rfc3339(),
                    snap.metrics.len()
                );
            }
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_stats(args: StatsArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let stats = store.stats_best_effort()?;

    let fmt = |v: Option<u64>| v.map(|x| x.to_string()).unwrap_or_else(|| "?".into());
    println!("snapshots: {}", fmt(stats.snapshots));
    println!("models:    {}", fmt(stats.models));
    println!(
        "last seq:  {}",
        stats
            .last_seq
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "last at:   {}",
        stats.last_created_at.as_deref().unwrap_or("-")
    );
    Ok(exit_codes::OK)
}
