//! Verdict scenarios for the regression detector, plus determinism checks.

use chrono::Utc;
use tally_core::compare::diff_snapshots;
use tally_core::model::{Environment, Snapshot};
use tally_core::regression::{
    evaluate, DetectionConfig, Direction, MetricPolicy, Verdict,
};

fn snapshot(id: &str, seq: i64, metrics: &[(&str, f64)]) -> Snapshot {
    Snapshot {
        id: id.into(),
        seq,
        model_name: "openai".into(),
        metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        environment: Environment::Ci,
        commit_sha: String::new(),
        branch_name: String::new(),
        triggered_by: String::new(),
        created_at: Utc::now(),
    }
}

fn config(entries: &[(&str, Direction, f64)]) -> DetectionConfig {
    DetectionConfig {
        metrics: entries
            .iter()
            .map(|(name, direction, noise_threshold)| {
                (
                    name.to_string(),
                    MetricPolicy {
                        direction: *direction,
                        noise_threshold: *noise_threshold,
                    },
                )
            })
            .collect(),
    }
}

#[test]
fn test_scenario_improvement() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("accuracy", 0.80)]),
        &snapshot("snap-b", 2, &[("accuracy", 0.86)]),
    );
    let cfg = config(&[("accuracy", Direction::HigherIsBetter, 0.05)]);

    let verdicts = evaluate(&result, &cfg);
    let v = &verdicts["accuracy"];
    assert_eq!(v.verdict, Verdict::Improved, "7.5% > 5% in the better direction");
    assert_eq!(v.threshold, Some(0.05), "applied threshold is recorded");
    assert!((v.percent_change.unwrap() - 0.075).abs() < 1e-12);
}

#[test]
fn test_scenario_noise() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("latency_ms", 100.0)]),
        &snapshot("snap-b", 2, &[("latency_ms", 103.0)]),
    );
    let cfg = config(&[("latency_ms", Direction::LowerIsBetter, 0.05)]);

    let verdicts = evaluate(&result, &cfg);
    assert_eq!(verdicts["latency_ms"].verdict, Verdict::Unchanged, "3% <= 5%");
}

#[test]
fn test_scenario_regression() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("cost_usd", 0.02)]),
        &snapshot("snap-b", 2, &[("cost_usd", 0.03)]),
    );
    let cfg = config(&[("cost_usd", Direction::LowerIsBetter, 0.05)]);

    let verdicts = evaluate(&result, &cfg);
    let v = &verdicts["cost_usd"];
    assert_eq!(v.verdict, Verdict::Regressed, "50% increase in the worse direction");
    assert!(v.delta.unwrap() > 0.0);
}

#[test]
fn test_unconfigured_metric_is_insufficient_data() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("f1_score", 0.60)]),
        &snapshot("snap-b", 2, &[("f1_score", 0.10)]),
    );

    // Empty config: a wrong-direction guess could mask a real regression.
    let verdicts = evaluate(&result, &DetectionConfig::default());
    let v = &verdicts["f1_score"];
    assert_eq!(v.verdict, Verdict::InsufficientData);
    assert_eq!(v.threshold, None);
    assert!(v.reason.contains("no detection policy"));
}

#[test]
fn test_missing_metric_never_yields_a_false_verdict() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("accuracy", 0.80), ("recall", 0.70)]),
        &snapshot("snap-b", 2, &[("accuracy", 0.80), ("precision", 0.90)]),
    );
    let cfg = config(&[
        ("recall", Direction::HigherIsBetter, 0.05),
        ("precision", Direction::HigherIsBetter, 0.05),
    ]);

    let verdicts = evaluate(&result, &cfg);
    assert_eq!(verdicts["recall"].verdict, Verdict::InsufficientData);
    assert!(verdicts["recall"].reason.contains("missing in candidate"));
    assert_eq!(verdicts["precision"].verdict, Verdict::InsufficientData);
    assert!(verdicts["precision"].reason.contains("missing in baseline"));
}

#[test]
fn test_zero_baseline_verdicts() {
    let cfg = config(&[("errors", Direction::LowerIsBetter, 0.05)]);

    // No change from zero stays unchanged.
    let flat = diff_snapshots(
        &snapshot("snap-a", 1, &[("errors", 0.0)]),
        &snapshot("snap-b", 2, &[("errors", 0.0)]),
    );
    assert_eq!(evaluate(&flat, &cfg)["errors"].verdict, Verdict::Unchanged);

    // A change away from zero is classified by direction alone; the
    // percent gate is bypassed and reported as undefined.
    let worse = diff_snapshots(
        &snapshot("snap-a", 1, &[("errors", 0.0)]),
        &snapshot("snap-b", 2, &[("errors", 4.0)]),
    );
    let v = &evaluate(&worse, &cfg)["errors"];
    assert_eq!(v.verdict, Verdict::Regressed);
    assert_eq!(v.percent_change, None);
}

#[test]
fn test_evaluate_is_deterministic() {
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("accuracy", 0.80), ("cost_usd", 0.02), ("recall", 0.5)]),
        &snapshot("snap-b", 2, &[("accuracy", 0.86), ("cost_usd", 0.03), ("f1", 0.6)]),
    );
    let cfg = config(&[
        ("accuracy", Direction::HigherIsBetter, 0.05),
        ("cost_usd", Direction::LowerIsBetter, 0.05),
    ]);

    let first = serde_json::to_string(&evaluate(&result, &cfg)).unwrap();
    let second = serde_json::to_string(&evaluate(&result, &cfg)).unwrap();
    let third = serde_json::to_string(&evaluate(&result, &cfg)).unwrap();
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_boundary_change_exactly_at_threshold_is_noise() {
    // 5% change with a 0.05 threshold sits inside the noise band.
    let result = diff_snapshots(
        &snapshot("snap-a", 1, &[("latency_ms", 100.0)]),
        &snapshot("snap-b", 2, &[("latency_ms", 105.0)]),
    );
    let cfg = config(&[("latency_ms", Direction::LowerIsBetter, 0.05)]);

    let verdicts = evaluate(&result, &cfg);
    assert_eq!(verdicts["latency_ms"].verdict, Verdict::Unchanged);
}
