use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql, TransactionBehavior};

use crate::errors::StoreError;
use crate::ingest::{self, SnapshotDraft};
use crate::model::{format_ts, parse_ts, Environment, MetricMap, Snapshot, SnapshotFilter};

/// Upper bound on waiting for a contended database before the call surfaces
/// `StoreError::Unavailable`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLS: &str = "SELECT seq, id, model_name, environment, commit_sha, branch_name, \
     triggered_by, created_at, metrics_json FROM snapshots";

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

pub struct StoreStats {
    pub snapshots: Option<u64>,
    pub models: Option<u64>,
    pub last_seq: Option<i64>,
    pub last_created_at: Option<String>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// SQLite in-memory DB
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(super::schema::DDL)?;

        // v0.2.0 migration: triggered_by arrived after the initial schema.
        migrate_v020(&conn)?;

        Ok(())
    }

    /// Appends one snapshot and returns it with its assigned id, sequence
    /// number, and creation timestamp.
    ///
    /// Sequence and id assignment happen inside a single IMMEDIATE write
    /// transaction: no two appends receive the same sequence number, and no
    /// reader ever observes a half-written row. Validation failures reject
    /// the draft before anything is written.
    pub fn append(&self, draft: &SnapshotDraft) -> Result<Snapshot, StoreError> {
        let environment = ingest::validate(draft)?;
        let metrics_json = serde_json::to_string(&draft.metrics)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let seq: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM snapshots", [], |r| {
            r.get(0)
        })?;

        // created_at stays non-decreasing across the store even when the
        // wall clock steps backwards between appends.
        let last: Option<String> = tx
            .query_row(
                "SELECT created_at FROM snapshots ORDER BY seq DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        let now = Utc::now();
        // Truncate to the persisted microsecond precision so the returned
        // snapshot is identical to what a later get() reads back.
        let now = DateTime::<Utc>::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
        let created_at = match last.as_deref().and_then(parse_ts) {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        let created_str = format_ts(created_at);
        let id = snapshot_id(&draft.model_name, &created_str, seq);

        tx.execute(
            "INSERT INTO snapshots(seq, id, model_name, environment, commit_sha, branch_name, triggered_by, created_at, metrics_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                seq,
                id,
                draft.model_name,
                environment.as_str(),
                draft.commit_sha,
                draft.branch_name,
                draft.triggered_by,
                created_str,
                metrics_json
            ],
        )?;
        tx.commit()?;

        tracing::debug!(seq, id = %id, model = %draft.model_name, "appended snapshot");

        Ok(Snapshot {
            id,
            seq,
            model_name: draft.model_name.clone(),
            metrics: draft.metrics.clone(),
            environment,
            commit_sha: draft.commit_sha.clone(),
            branch_name: draft.branch_name.clone(),
            triggered_by: draft.triggered_by.clone(),
            created_at,
        })
    }

    pub fn get(&self, id: &str) -> Result<Snapshot, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLS))?;
        let snap = stmt.query_row(params![id], row_to_snapshot).optional()?;
        snap.ok_or_else(|| StoreError::NotFound(format!("snapshot '{}'", id)))
    }

    /// Conjunctive filters, ascending `(created_at, seq)` order. The result
    /// is fully materialized before the call returns: either the whole
    /// filtered set or an error, never a partial listing.
    pub fn query(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>, StoreError> {
        let mut sql = String::from(SELECT_COLS);
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(model) = &filter.model_name {
            args.push(Box::new(model.clone()));
            clauses.push(format!("model_name = ?{}", args.len()));
        }
        if let Some(env) = filter.environment {
            args.push(Box::new(env.as_str()));
            clauses.push(format!("environment = ?{}", args.len()));
        }
        if let Some(branch) = &filter.branch_name {
            args.push(Box::new(branch.clone()));
            clauses.push(format!("branch_name = ?{}", args.len()));
        }
        if let Some(since) = filter.range.since {
            args.push(Box::new(format_ts(since)));
            clauses.push(format!("created_at >= ?{}", args.len()));
        }
        if let Some(until) = filter.range.until {
            args.push(Box::new(format_ts(until)));
            clauses.push(format!("created_at <= ?{}", args.len()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at ASC, seq ASC");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt.query_map(&refs[..], row_to_snapshot)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }

    /// Snapshot with the greatest `(created_at, seq)` for the filter, or
    /// `NotFound` naming the filter when nothing matches.
    pub fn latest(&self, model_name: &str, environment: Environment) -> Result<Snapshot, StoreError> {
        self.latest_at_or_before(model_name, environment, None)?
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "no snapshots for model '{}' in environment '{}'",
                    model_name, environment
                ))
            })
    }

    /// Like `latest`, with an optional upper bound on `created_at`. Absence
    /// is an `Ok(None)` here; `compare_models` omits such models rather than
    /// failing.
    pub fn latest_at_or_before(
        &self,
        model_name: &str,
        environment: Environment,
        at_or_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let snap = match at_or_before {
            Some(cutoff) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE model_name = ?1 AND environment = ?2 AND created_at <= ?3
                     ORDER BY created_at DESC, seq DESC LIMIT 1",
                    SELECT_COLS
                ))?;
                stmt.query_row(
                    params![model_name, environment.as_str(), format_ts(cutoff)],
                    row_to_snapshot,
                )
                .optional()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE model_name = ?1 AND environment = ?2
                     ORDER BY created_at DESC, seq DESC LIMIT 1",
                    SELECT_COLS
                ))?;
                stmt.query_row(params![model_name, environment.as_str()], row_to_snapshot)
                    .optional()?
            }
        };
        Ok(snap)
    }

    pub fn stats_best_effort(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock().unwrap();

        let snapshots: Option<u64> = conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |r| {
                r.get::<_, i64>(0).map(|x| x as u64)
            })
            .ok();
        let models: Option<u64> = conn
            .query_row("SELECT COUNT(DISTINCT model_name) FROM snapshots", [], |r| {
                r.get::<_, i64>(0).map(|x| x as u64)
            })
            .ok();

        let last: Option<(i64, String)> = conn
            .query_row(
                "SELECT seq, created_at FROM snapshots ORDER BY seq DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();

        let (last_seq, last_created_at) = match last {
            Some((seq, at)) => (Some(seq), Some(at)),
            None => (None, None),
        };

        Ok(StoreStats {
            snapshots,
            models,
            last_seq,
            last_created_at,
        })
    }
}

/// Opaque id: digest over model, creation time, and sequence. The sequence
/// component makes the input unique per append.
fn snapshot_id(model_name: &str, created_at: &str, seq: i64) -> String {
    let digest = md5::compute(format!("{}|{}|{}", model_name, created_at, seq));
    format!("snap-{:x}", digest)
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Snapshot> {
    use rusqlite::types::Type;

    let environment_raw: String = row.get(3)?;
    let environment = Environment::parse(&environment_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unrecognized environment '{}'", environment_raw).into(),
        )
    })?;

    let created_raw: String = row.get(7)?;
    let created_at = parse_ts(&created_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unparseable created_at '{}'", created_raw).into(),
        )
    })?;

    let metrics_raw: String = row.get(8)?;
    let metrics: MetricMap = serde_json::from_str(&metrics_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
    })?;

    Ok(Snapshot {
        seq: row.get(0)?,
        id: row.get(1)?,
        model_name: row.get(2)?,
        environment,
        commit_sha: row.get(4)?,
        branch_name: row.get(5)?,
        triggered_by: row.get(6)?,
        created_at,
        metrics,
    })
}

fn migrate_v020(conn: &Connection) -> Result<(), StoreError> {
    let cols = get_columns(conn, "snapshots")?;
    add_column_if_missing(
        conn,
        &cols,
        "snapshots",
        "triggered_by",
        "TEXT NOT NULL DEFAULT ''",
    )?;
    Ok(())
}

fn get_columns(
    conn: &Connection,
    table: &str,
) -> Result<std::collections::HashSet<String>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = std::collections::HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &std::collections::HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> Result<(), StoreError> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}
