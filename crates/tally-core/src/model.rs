use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Open metric schema: metric name to measured value. Keys are not fixed a
/// priori; absence of a key is distinct from a value of zero.
pub type MetricMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Staging,
    Production,
    Ci,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Environment::Local),
            "staging" => Some(Environment::Staging),
            "production" => Some(Environment::Production),
            "ci" => Some(Environment::Ci),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Ci => "ci",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted benchmark snapshot. Immutable once appended; a new snapshot
/// is the only way to revise a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    /// Store-assigned sequence number; strictly increasing with insertion
    /// order and the tie-breaker for equal `created_at` values.
    pub seq: i64,
    pub model_name: String,
    pub metrics: MetricMap,
    pub environment: Environment,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
}

/// Conjunctive filters for `Store::query`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub model_name: Option<String>,
    pub environment: Option<Environment>,
    pub branch_name: Option<String>,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Fixed-width RFC 3339 UTC, microsecond precision. Lexicographic order of
/// the stored text equals chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
