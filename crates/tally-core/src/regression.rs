use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compare::{ComparisonResult, MetricComparison};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Detection policy for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPolicy {
    pub direction: Direction,
    /// Fractional noise band, e.g. 0.05 treats changes within ±5% as noise.
    pub noise_threshold: f64,
}

/// Passed into `evaluate` explicitly so different call sites (CI gate,
/// dashboard exploration) can apply different policies without
/// interference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improved,
    Regressed,
    Unchanged,
    InsufficientData,
}

/// One metric's verdict with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricVerdict {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    /// The noise threshold that was applied; absent when no policy matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub reason: String,
}

/// Pure function of its inputs: identical comparison and config always
/// produce identical verdicts.
pub fn evaluate(
    result: &ComparisonResult,
    config: &DetectionConfig,
) -> BTreeMap<String, MetricVerdict> {
    let mut verdicts = BTreeMap::new();
    for (metric, cmp) in &result.metrics {
        verdicts.insert(metric.clone(), evaluate_metric(metric, cmp, config));
    }
    verdicts
}

fn evaluate_metric(
    metric: &str,
    cmp: &MetricComparison,
    config: &DetectionConfig,
) -> MetricVerdict {
    let (delta, percent_change) = match cmp {
        MetricComparison::Both {
            delta,
            percent_change,
            ..
        } => (*delta, *percent_change),
        MetricComparison::MissingInBaseline { .. } => {
            return insufficient(
                None,
                None,
                format!("metric '{}' missing in baseline snapshot", metric),
            )
        }
        MetricComparison::MissingInCandidate { .. } => {
            return insufficient(
                None,
                None,
                format!("metric '{}' missing in candidate snapshot", metric),
            )
        }
    };

    // An unconfigured metric never gets a guessed direction; a wrong guess
    // would silently mask real regressions.
    let Some(policy) = config.metrics.get(metric) else {
        return insufficient(
            Some(delta),
            percent_change,
            format!("no detection policy configured for metric '{}'", metric),
        );
    };

    let signed_improvement = match policy.direction {
        Direction::HigherIsBetter => delta,
        Direction::LowerIsBetter => -delta,
    };

    let (verdict, reason) = match percent_change {
        Some(pc) if pc.abs() <= policy.noise_threshold => (
            Verdict::Unchanged,
            format!(
                "change {:+.4} within noise threshold {}",
                pc, policy.noise_threshold
            ),
        ),
        Some(pc) if signed_improvement > 0.0 => (
            Verdict::Improved,
            format!(
                "change {:+.4} beyond noise threshold {}",
                pc, policy.noise_threshold
            ),
        ),
        Some(pc) => (
            Verdict::Regressed,
            format!(
                "change {:+.4} beyond noise threshold {}",
                pc, policy.noise_threshold
            ),
        ),
        // Baseline was zero: the fractional gate cannot apply. No change is
        // unchanged; any other change is classified by direction alone.
        None if delta == 0.0 => (Verdict::Unchanged, "no change from zero baseline".into()),
        None if signed_improvement > 0.0 => (
            Verdict::Improved,
            "change from zero baseline (percent change undefined)".into(),
        ),
        None => (
            Verdict::Regressed,
            "change from zero baseline (percent change undefined)".into(),
        ),
    };

    MetricVerdict {
        verdict,
        delta: Some(delta),
        percent_change,
        threshold: Some(policy.noise_threshold),
        reason,
    }
}

fn insufficient(delta: Option<f64>, percent_change: Option<f64>, reason: String) -> MetricVerdict {
    MetricVerdict {
        verdict: Verdict::InsufficientData,
        delta,
        percent_change,
        threshold: None,
        reason,
    }
}
