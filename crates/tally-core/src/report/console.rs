use std::collections::BTreeMap;

use crate::compare::{ComparisonResult, MetricComparison};
use crate::regression::{MetricVerdict, Verdict};

/// Sectioned text report of a comparison and its verdicts.
pub fn print_report(result: &ComparisonResult, verdicts: &BTreeMap<String, MetricVerdict>) {
    println!(
        "Comparing {} (baseline) -> {} (candidate)",
        result.baseline_id, result.candidate_id
    );

    let regressed: Vec<_> = by_verdict(verdicts, Verdict::Regressed);
    let improved: Vec<_> = by_verdict(verdicts, Verdict::Improved);
    let unchanged: Vec<_> = by_verdict(verdicts, Verdict::Unchanged);
    let insufficient: Vec<_> = by_verdict(verdicts, Verdict::InsufficientData);

    if !regressed.is_empty() {
        println!("\n❌ REGRESSIONS ({}):", regressed.len());
        for (metric, v) in &regressed {
            println!("  - {}: {}", value_line(metric, result), change_str(v));
        }
    } else {
        println!("\n✅ No regressions.");
    }

    if !improved.is_empty() {
        println!("\n🎉 IMPROVEMENTS ({}):", improved.len());
        for (metric, v) in &improved {
            println!("  - {}: {}", value_line(metric, result), change_str(v));
        }
    }

    if !unchanged.is_empty() {
        println!("\n✅ UNCHANGED ({}):", unchanged.len());
        for (metric, v) in &unchanged {
            println!("  - {}: {}", value_line(metric, result), change_str(v));
        }
    }

    if !insufficient.is_empty() {
        println!("\n⚠️ INSUFFICIENT DATA ({}):", insufficient.len());
        for (metric, v) in &insufficient {
            println!("  - {}: {}", metric, v.reason);
        }
    }

    println!(
        "\n{} improved, {} regressed, {} unchanged, {} insufficient",
        improved.len(),
        regressed.len(),
        unchanged.len(),
        insufficient.len()
    );
}

fn by_verdict<'a>(
    verdicts: &'a BTreeMap<String, MetricVerdict>,
    want: Verdict,
) -> Vec<(&'a str, &'a MetricVerdict)> {
    verdicts
        .iter()
        .filter(|(_, v)| v.verdict == want)
        .map(|(k, v)| (k.as_str(), v))
        .collect()
}

fn value_line(metric: &str, result: &ComparisonResult) -> String {
    match result.metrics.get(metric) {
        Some(MetricComparison::Both {
            baseline,
            candidate,
            ..
        }) => format!("{} {:.4} -> {:.4}", metric, baseline, candidate),
        Some(MetricComparison::MissingInBaseline { candidate }) => {
            format!("{} (absent) -> {:.4}", metric, candidate)
        }
        Some(MetricComparison::MissingInCandidate { baseline }) => {
            format!("{} {:.4} -> (absent)", metric, baseline)
        }
        None => metric.to_string(),
    }
}

fn change_str(v: &MetricVerdict) -> String {
    match v.percent_change {
        Some(pc) => format!("{:+.1}%", pc * 100.0),
        None => match v.delta {
            Some(delta) => format!("{:+.4} (percent undefined)", delta),
            None => "-".to_string(),
        },
    }
}
