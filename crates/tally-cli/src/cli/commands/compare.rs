use std::collections::BTreeMap;

use serde::Serialize;

use super::exit_codes;
use crate::cli::args::{CompareArgs, OutputFormat};
use tally_core::compare::{self, ComparisonResult};
use tally_core::config;
use tally_core::regression::{self, DetectionConfig, MetricVerdict, Verdict};
use tally_core::report::console;

/// Machine-readable gate output: the comparison, the verdicts, and the
/// fingerprint of the policy file that produced them.
#[derive(Serialize)]
struct GateReport {
    comparison: ComparisonResult,
    verdicts: BTreeMap<String, MetricVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_fingerprint: Option<String>,
}

pub fn cmd_compare(args: CompareArgs) -> anyhow::Result<i32> {
    let store = super::open_store(&args.db)?;
    let result = compare::compare(&store, &args.baseline, &args.candidate)?;

    let (config, fingerprint) = match &args.policies {
        Some(path) => (
            config::load_policies(path, args.strict)?,
            Some(config::compute_policy_fingerprint(path)),
        ),
        None => (DetectionConfig::default(), None),
    };

    let verdicts = regression::evaluate(&result, &config);
    let regressed = verdicts
        .values()
        .filter(|v| v.verdict == Verdict::Regressed)
        .count();

    match args.format {
        OutputFormat::Json => {
            let report = GateReport {
                comparison: result,
                verdicts,
                policy_fingerprint: fingerprint,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            console::print_report(&result, &verdicts);
            if let Some(fp) = &fingerprint {
                eprintln!("policy fingerprint: {}", fp);
            }
        }
    }

    if args.fail_on_regression && regressed > 0 {
        eprintln!("REGRESSION DETECTED: {} metric(s) regressed", regressed);
        return Ok(exit_codes::REGRESSION);
    }
    Ok(exit_codes::OK)
}
