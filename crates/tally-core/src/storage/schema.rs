pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
  seq INTEGER PRIMARY KEY,
  id TEXT NOT NULL UNIQUE,
  model_name TEXT NOT NULL,
  environment TEXT NOT NULL,
  commit_sha TEXT NOT NULL DEFAULT '',
  branch_name TEXT NOT NULL DEFAULT '',
  triggered_by TEXT NOT NULL DEFAULT '',
  created_at TEXT NOT NULL,
  metrics_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_model_created
  ON snapshots(model_name, created_at, seq);

CREATE INDEX IF NOT EXISTS idx_snapshots_environment
  ON snapshots(environment);
"#;
