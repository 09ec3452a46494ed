//! End-to-end test: hard gate failures always end in a reject verdict,
//! while the job itself still succeeds.

use crate::support::*;
use ave_types::{ActorType, Decision, JobStatus, SpecStatus};
use serde_json::json;

#[tokio::test]
async fn empty_bundle_is_rejected() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.unwrap();

    assert_eq!(report.decision, Decision::Reject);
    assert!(!report.gates_passed);
    assert!(!report.report.gates.evidence);
    assert_eq!(report.report.counts.evidence_total, 0);
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn unfrozen_spec_is_rejected() {
    let svc = service();
    let snapshot = snapshot(&svc, "rank the top 3 vendors", json!({})).await;
    let spec = draft_spec(&svc, &snapshot).await;
    let outcome = accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;
    assert_eq!(outcome.spec.status, SpecStatus::Draft);

    let (delivery, bundle) = deliver(&svc, &outcome.spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&outcome.spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.unwrap();

    assert_eq!(report.decision, Decision::Reject);
    assert!(!report.report.gates.spec_frozen);
    assert!(report.report.gates.structure);
    assert!(report
        .report
        .gate_failures
        .iter()
        .any(|reason| reason.contains("DRAFT")));
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn blank_claim_ids_zero_coverage() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(
        &svc,
        &spec,
        json!({"items": [{"claimId": "", "entity": "A", "rank": 1, "evidenceRefs": ["ev1"]}]}),
    )
    .await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let report = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap()
        .report
        .unwrap();

    assert_eq!(report.decision, Decision::Reject);
    assert_eq!(report.report.scores.evidence, 0.0);
    assert_eq!(report.report.counts.claims_missing_id, 1);
}

#[tokio::test]
async fn wrong_shape_fails_structure() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, json!({"rows": []})).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let report = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap()
        .report
        .unwrap();

    assert_eq!(report.decision, Decision::Reject);
    assert!(!report.report.gates.structure);
    assert_eq!(report.report.scores.structure, 0.0);
}
