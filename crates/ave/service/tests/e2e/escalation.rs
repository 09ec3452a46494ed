//! End-to-end test: stale evidence drags the score into the escalation band
//! and the job waits for a human decision.

use crate::support::*;
use ave_types::{Decision, JobStatus};
use chrono::{Duration, Utc};
use serde_json::json;

#[tokio::test]
async fn stale_evidence_escalates_to_review() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({"recencyDays": 7})).await;
    assert_eq!(spec.spec.evidence_policy.recency_days, Some(7));

    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", Some(Utc::now() - Duration::days(30))).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.expect("escalations still produce a report");

    assert!(report.gates_passed);
    assert!(report.report.freshness.enforced);
    assert_eq!(report.report.scores.freshness, 0.0);
    assert_eq!(report.score, 0.75);
    assert_eq!(report.decision, Decision::Escalate);

    assert_eq!(outcome.job.status, JobStatus::ReviewRequired);
    assert_eq!(outcome.job.report_id.as_ref(), Some(&report.id));
}

#[tokio::test]
async fn fresh_evidence_within_window_is_accepted() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({"recencyDays": 7})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", Some(Utc::now() - Duration::days(1))).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();

    assert_eq!(outcome.report.unwrap().decision, Decision::Accept);
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
}
