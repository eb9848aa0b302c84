use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::StoreError;
use crate::model::{Environment, Snapshot, SnapshotFilter, TimeRange};
use crate::storage::Store;

/// Read-only projections over the snapshot log. Never mutates the store.
pub struct History {
    store: Store,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub created_at: DateTime<Utc>,
    pub value: f64,
    pub snapshot_id: String,
}

impl History {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Metric values over time for one model, ascending. An empty vec is a
    /// legitimate answer, not an error.
    pub fn trend(
        &self,
        model_name: &str,
        metric_name: &str,
        environment: Environment,
        range: &TimeRange,
    ) -> Result<Vec<TrendPoint>, StoreError> {
        let filter = SnapshotFilter {
            model_name: Some(model_name.to_string()),
            environment: Some(environment),
            branch_name: None,
            range: *range,
        };
        let snapshots = self.store.query(&filter)?;

        let mut points = Vec::new();
        for snap in snapshots {
            // Absence of the metric is not zero; such snapshots are skipped.
            if let Some(&value) = snap.metrics.get(metric_name) {
                points.push(TrendPoint {
                    created_at: snap.created_at,
                    value,
                    snapshot_id: snap.id,
                });
            }
        }
        Ok(points)
    }

    /// Latest snapshot per model at or before the cut-off. Models with no
    /// matching snapshot are omitted from the result, never defaulted.
    pub fn compare_models(
        &self,
        model_names: &[String],
        environment: Environment,
        at_or_before: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<String, Snapshot>, StoreError> {
        let mut out = BTreeMap::new();
        for model in model_names {
            if let Some(snap) = self
                .store
                .latest_at_or_before(model, environment, at_or_before)?
            {
                out.insert(model.clone(), snap);
            }
        }
        Ok(out)
    }
}
