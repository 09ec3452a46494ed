//! End-to-end test: internal failures during a run are captured on the job,
//! and invalid job requests are refused up front.

use crate::support::*;
use ave_service::ServiceError;
use ave_storage::ReportStore;
use ave_types::{
    Decision, DecisionPolicy, DimensionScores, EvaluationSpec, FreshnessSummary, GateOutcomes,
    InspectionReport, JobId, JobStatus, NormalizedDelivery, ReportCounts, ScoringWeights,
    VerificationJob, VerificationReport,
};
use chrono::Utc;
use serde_json::json;

fn placeholder_report(
    job: &VerificationJob,
    spec: &EvaluationSpec,
    delivery: &NormalizedDelivery,
) -> VerificationReport {
    let inspection = InspectionReport {
        spec_id: spec.id.clone(),
        spec_hash: spec.hash,
        spec_status: spec.status,
        delivery_id: delivery.id.clone(),
        delivery_hash: delivery.hash,
        bundle_id: job.bundle_id.clone(),
        deliverable_type: spec.deliverable_type,
        gates: GateOutcomes {
            structure: false,
            evidence: false,
            spec_frozen: true,
        },
        gates_passed: false,
        gate_failures: vec![],
        scores: DimensionScores {
            structure: 0.0,
            evidence: 0.0,
            freshness: 0.0,
        },
        weights: ScoringWeights::default(),
        policy: DecisionPolicy::default(),
        freshness: FreshnessSummary {
            enforced: false,
            recency_days: None,
        },
        counts: ReportCounts::default(),
        score: 0.0,
        decision: Decision::Reject,
        evaluated_at: Utc::now(),
    };
    VerificationReport::from_inspection(job.id.clone(), inspection, Utc::now()).unwrap()
}

#[tokio::test]
async fn report_conflict_fails_job_with_payload() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let job = svc
        .create_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();

    // Occupy the job's single report slot so persisting the real one fails.
    svc.storage()
        .insert_report(placeholder_report(&job, &spec, &delivery))
        .await
        .unwrap();

    let outcome = svc.run_verification_job(&job.id).await.unwrap();
    assert_eq!(outcome.job.status, JobStatus::Failed);
    assert!(outcome.report.is_none());
    assert!(outcome.job.report_id.is_none());

    let payload = outcome.job.error_payload.expect("error payload");
    assert_eq!(payload["code"], "CONFLICT");
    assert_eq!(payload["stage"], "persist_report");
    assert!(payload["message"].as_str().unwrap().contains(job.id.as_str()));
}

#[tokio::test]
async fn finished_job_cannot_run_again() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();

    let err = svc.run_verification_job(&outcome.job.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn sealed_bundle_refuses_items() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    svc.create_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();

    let err = svc
        .add_evidence_item(&bundle.id, evidence("ev2", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(svc.list_evidence_items(&bundle.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bundle_from_another_delivery_is_refused() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, _) = deliver(&svc, &spec, vendor_table()).await;
    let (_, other_bundle) = deliver(&svc, &spec, vendor_table()).await;

    let err = svc
        .create_verification_job(job_request(&spec, &delivery, &other_bundle))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(!svc
        .get_evidence_bundle(&other_bundle.id)
        .await
        .unwrap()
        .is_sealed());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let svc = service();
    let err = svc
        .run_verification_job(&JobId::new("missing"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
