use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::model::{Environment, MetricMap};

/// Snapshot document as handed over by the conversion step. `Store::append`
/// is the sole entry point for these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDraft {
    pub model_name: String,
    pub metrics: MetricMap,
    pub environment: String,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub triggered_by: String,
}

impl SnapshotDraft {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Validation {
            field: "document".into(),
            reason: format!("not a valid snapshot document: {}", e),
        })
    }
}

/// Checks required fields before anything touches the database. Returns the
/// parsed environment so the caller never persists the raw string.
pub fn validate(draft: &SnapshotDraft) -> Result<Environment, StoreError> {
    if draft.model_name.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "model_name".into(),
            reason: "must be non-empty".into(),
        });
    }
    if draft.metrics.is_empty() {
        return Err(StoreError::Validation {
            field: "metrics".into(),
            reason: "must contain at least one metric".into(),
        });
    }
    for (name, value) in &draft.metrics {
        if !value.is_finite() {
            return Err(StoreError::Validation {
                field: format!("metrics.{}", name),
                reason: format!("value {} is not a finite number", value),
            });
        }
    }
    Environment::parse(&draft.environment).ok_or_else(|| StoreError::Validation {
        field: "environment".into(),
        reason: format!(
            "'{}' is not one of local|staging|production|ci",
            draft.environment
        ),
    })
}
