//! End-to-end test: a ranked vendor table backed by evidence is accepted.

use crate::support::*;
use ave_types::{Decision, DeliverableType, JobStatus};
use serde_json::json;

#[tokio::test]
async fn ranked_vendor_table_is_accepted() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    assert_eq!(spec.deliverable_type, DeliverableType::RankedTable);

    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    let items = delivery.normalized_payload["items"].as_array().unwrap();
    assert_eq!(items[0]["claimId"], "claim-1");
    assert_eq!(items[1]["claimId"], "claim-2");

    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.expect("report");

    assert_eq!(report.decision, Decision::Accept);
    assert_eq!(report.score, 1.0);
    assert!(report.gates_passed);
    assert!(report.verify_hash());
    assert_eq!(report.report.counts.claims_total, 2);
    assert_eq!(report.report.counts.claims_covered, 2);
    assert!(!report.report.freshness.enforced);

    assert_eq!(outcome.job.status, JobStatus::Succeeded);
    assert_eq!(outcome.job.report_id.as_ref(), Some(&report.id));
    assert!(outcome.job.error_payload.is_none());
}

#[tokio::test]
async fn report_is_reachable_by_id_and_job() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the best vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.unwrap();

    let by_id = svc.get_verification_report(&report.id).await.unwrap();
    let by_job = svc.get_report_for_job(&outcome.job.id).await.unwrap();
    assert_eq!(by_id, report);
    assert_eq!(by_job, report);

    let job = svc.get_verification_job(&outcome.job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn queued_job_seals_bundle() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let job = svc
        .create_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(svc.get_evidence_bundle(&bundle.id).await.unwrap().is_sealed());

    let outcome = svc.run_verification_job(&job.id).await.unwrap();
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn cited_memo_is_accepted() {
    let svc = service();
    let spec = frozen_spec(&svc, "write a memo on vendor pricing", json!({})).await;
    assert_eq!(spec.deliverable_type, DeliverableType::Memo);

    let (delivery, bundle) = deliver(
        &svc,
        &spec,
        json!({
            "title": "Pricing",
            "summary": "Vendor A is cheapest",
            "findings": ["A undercuts B by 10%"],
            "sources": [{"claimId": "c1", "reference": "ev1"}]
        }),
    )
    .await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    assert_eq!(outcome.report.unwrap().decision, Decision::Accept);
}
