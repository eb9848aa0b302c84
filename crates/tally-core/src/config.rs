use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::regression::{DetectionConfig, MetricPolicy};

pub const SUPPORTED_POLICY_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    metrics: BTreeMap<String, MetricPolicy>,
}

fn default_version() -> u32 {
    SUPPORTED_POLICY_VERSION
}

/// Loads per-metric detection policies from a YAML file. Unknown keys fail
/// in strict mode and are logged otherwise.
pub fn load_policies(path: &Path, strict: bool) -> Result<DetectionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read policy file {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    // serde_ignored wrapper to capture unknown fields
    let file: PolicyFile = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored_keys.is_empty() {
        let mut unknowns: Vec<_> = ignored_keys.into_iter().collect();
        unknowns.sort();
        if strict {
            return Err(ConfigError(format!(
                "unknown fields in strict mode: {:?} (file: {})",
                unknowns,
                path.display()
            )));
        }
        tracing::warn!(?unknowns, "ignored unknown policy fields");
    }

    if file.version != SUPPORTED_POLICY_VERSION {
        return Err(ConfigError(format!(
            "unsupported policy version {} (supported: {})",
            file.version, SUPPORTED_POLICY_VERSION
        )));
    }

    if file.metrics.is_empty() {
        return Err(ConfigError("policy file has no metrics".into()));
    }

    for (name, policy) in &file.metrics {
        if !policy.noise_threshold.is_finite() || policy.noise_threshold < 0.0 {
            return Err(ConfigError(format!(
                "metric '{}': noise_threshold must be a non-negative finite fraction, got {}",
                name, policy.noise_threshold
            )));
        }
    }

    Ok(DetectionConfig {
        metrics: file.metrics,
    })
}

/// Digest of the policy file content, recorded alongside verdicts so a gate
/// decision can be audited against the exact thresholds used.
pub fn compute_policy_fingerprint(path: &Path) -> String {
    if let Ok(content) = std::fs::read(path) {
        format!("md5:{:x}", md5::compute(content))
    } else {
        "md5:unknown".to_string()
    }
}

pub fn write_sample_policies(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
metrics:
  accuracy:
    direction: higher_is_better
    noise_threshold: 0.05
  latency_ms:
    direction: lower_is_better
    noise_threshold: 0.05
  cost_usd:
    direction: lower_is_better
    noise_threshold: 0.05
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample policy file: {}", e)))?;
    Ok(())
}
