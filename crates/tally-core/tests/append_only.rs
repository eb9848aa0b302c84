//! Append-only and sequencing properties of the snapshot log:
//! - repeated reads return identical content, nothing mutates a stored row
//! - sequence numbers strictly increase with insertion order
//! - validation rejects a draft before anything is persisted

use tally_core::errors::StoreError;
use tally_core::ingest::SnapshotDraft;
use tally_core::storage::Store;

fn draft(model: &str, metrics: &[(&str, f64)]) -> SnapshotDraft {
    SnapshotDraft {
        model_name: model.into(),
        metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        environment: "ci".into(),
        commit_sha: String::new(),
        branch_name: String::new(),
        triggered_by: "append-only-test".into(),
    }
}

#[test]
fn test_repeated_get_is_identical() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let snap = store.append(&draft("openai", &[("accuracy", 0.8125), ("cost_usd", 0.02)]))?;

    let first = serde_json::to_string(&store.get(&snap.id)?)?;
    // Interleave other operations; the stored record must not move.
    store.append(&draft("medgemma", &[("accuracy", 0.79)]))?;
    let second = serde_json::to_string(&store.get(&snap.id)?)?;

    assert_eq!(first, second, "stored snapshot content must be immutable");
    Ok(())
}

#[test]
fn test_sequence_strictly_increases_per_model() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let mut openai_seqs = Vec::new();
    let mut medgemma_seqs = Vec::new();
    for i in 0..5 {
        let value = 0.7 + (i as f64) / 100.0;
        openai_seqs.push(store.append(&draft("openai", &[("accuracy", value)]))?.seq);
        medgemma_seqs.push(store.append(&draft("medgemma", &[("accuracy", value)]))?.seq);
    }

    for seqs in [&openai_seqs, &medgemma_seqs] {
        for pair in seqs.windows(2) {
            assert!(pair[0] < pair[1], "sequence must increase with insertion order");
        }
    }
    Ok(())
}

#[test]
fn test_created_at_non_decreasing() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let mut last = None;
    for i in 0..10 {
        let snap = store.append(&draft("openai", &[("accuracy", 0.5 + i as f64 / 100.0)]))?;
        if let Some(prev) = last {
            assert!(snap.created_at >= prev);
        }
        last = Some(snap.created_at);
    }
    Ok(())
}

#[test]
fn test_validation_names_the_offending_field() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let cases: Vec<(SnapshotDraft, &str)> = vec![
        (
            SnapshotDraft {
                model_name: "  ".into(),
                ..draft("x", &[("accuracy", 0.5)])
            },
            "model_name",
        ),
        (draft("openai", &[]), "metrics"),
        (draft("openai", &[("accuracy", f64::NAN)]), "metrics.accuracy"),
        (draft("openai", &[("accuracy", f64::INFINITY)]), "metrics.accuracy"),
        (
            SnapshotDraft {
                environment: "prod".into(),
                ..draft("openai", &[("accuracy", 0.5)])
            },
            "environment",
        ),
    ];

    for (bad, field) in cases {
        let err = store.append(&bad).unwrap_err();
        match &err {
            StoreError::Validation { field: f, .. } => {
                assert_eq!(f, field, "unexpected field in: {}", err)
            }
            other => panic!("expected Validation, got: {}", other),
        }
    }

    // Nothing was persisted by the rejected drafts.
    let stats = store.stats_best_effort()?;
    assert_eq!(stats.snapshots, Some(0));
    Ok(())
}

#[test]
fn test_ingest_document_parse_failure_is_validation() {
    let err = SnapshotDraft::from_json("{\"model_name\": 42}").unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));
}

#[test]
fn test_ingest_document_roundtrip() -> anyhow::Result<()> {
    let raw = r#"{
        "model_name": "baseline",
        "metrics": {"accuracy": 0.74, "latency_ms": 90},
        "environment": "staging",
        "commit_sha": "deadbeef",
        "branch_name": "main",
        "triggered_by": "nightly"
    }"#;
    let parsed = SnapshotDraft::from_json(raw)?;
    assert_eq!(parsed.model_name, "baseline");
    assert_eq!(parsed.metrics.get("latency_ms"), Some(&90.0));

    let store = Store::memory()?;
    store.init_schema()?;
    let snap = store.append(&parsed)?;
    assert_eq!(store.get(&snap.id)?.commit_sha, "deadbeef");
    Ok(())
}
