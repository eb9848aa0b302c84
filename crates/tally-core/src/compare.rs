use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::model::Snapshot;
use crate::storage::Store;

/// Per-metric outcome of comparing two snapshots. Metrics present in only
/// one snapshot are reported with an explicit marker, never dropped or
/// defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricComparison {
    Both {
        baseline: f64,
        candidate: f64,
        delta: f64,
        /// Fractional change (`delta / baseline`); undefined when the
        /// baseline value is zero.
        percent_change: Option<f64>,
    },
    MissingInBaseline {
        candidate: f64,
    },
    MissingInCandidate {
        baseline: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub baseline_id: String,
    pub candidate_id: String,
    pub metrics: BTreeMap<String, MetricComparison>,
}

/// Fetches both snapshots and diffs them. A missing id fails with
/// `NotFound` naming it.
pub fn compare(
    store: &Store,
    baseline_id: &str,
    candidate_id: &str,
) -> Result<ComparisonResult, StoreError> {
    let baseline = store.get(baseline_id)?;
    let candidate = store.get(candidate_id)?;
    Ok(diff_snapshots(&baseline, &candidate))
}

/// Pure diff over the union of metric keys. Same two snapshots always yield
/// the same result; no clock or randomness involved.
pub fn diff_snapshots(baseline: &Snapshot, candidate: &Snapshot) -> ComparisonResult {
    let keys: BTreeSet<&String> = baseline
        .metrics
        .keys()
        .chain(candidate.metrics.keys())
        .collect();

    let mut metrics = BTreeMap::new();
    for key in keys {
        let entry = match (baseline.metrics.get(key), candidate.metrics.get(key)) {
            (Some(&b), Some(&c)) => MetricComparison::Both {
                baseline: b,
                candidate: c,
                delta: c - b,
                percent_change: if b == 0.0 { None } else { Some((c - b) / b) },
            },
            (None, Some(&c)) => MetricComparison::MissingInBaseline { candidate: c },
            (Some(&b), None) => MetricComparison::MissingInCandidate { baseline: b },
            (None, None) => continue,
        };
        metrics.insert(key.clone(), entry);
    }

    ComparisonResult {
        baseline_id: baseline.id.clone(),
        candidate_id: candidate.id.clone(),
        metrics,
    }
}
