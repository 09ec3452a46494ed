//! End-to-end test: bilateral acceptance, idempotent re-acceptance and
//! re-review after edits.

use crate::support::*;
use ave_service::{ServiceError, UpdateEvaluationSpec};
use ave_types::{ActorType, SpecStatus};
use serde_json::json;

#[tokio::test]
async fn repeated_acceptance_is_recorded_once() {
    let svc = service();
    let snapshot = snapshot(&svc, "rank the top 3 vendors", json!({})).await;
    let spec = draft_spec(&svc, &snapshot).await;

    let first = accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;
    let second = accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;

    assert!(first.newly_recorded);
    assert!(!second.newly_recorded);
    assert_eq!(first.event.id, second.event.id);
    assert_eq!(svc.list_spec_acceptances(&spec.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn both_sides_freeze_the_spec() {
    let svc = service();
    let snapshot = snapshot(&svc, "rank the top 3 vendors", json!({})).await;
    let spec = draft_spec(&svc, &snapshot).await;

    let buyer = accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;
    assert_eq!(buyer.spec.status, SpecStatus::Draft);

    let seller = accept(&svc, &spec.id, ActorType::Seller, "seller-1").await;
    assert_eq!(seller.spec.status, SpecStatus::Frozen);
    assert_eq!(seller.spec.hash, spec.hash);

    let again = accept(&svc, &spec.id, ActorType::Seller, "seller-1").await;
    assert!(!again.newly_recorded);
    assert_eq!(again.spec.status, SpecStatus::Frozen);
}

#[tokio::test]
async fn edit_after_acceptance_requires_new_review() {
    let svc = service();
    let snapshot = snapshot(&svc, "rank the top 3 vendors", json!({})).await;
    let spec = draft_spec(&svc, &snapshot).await;
    accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;

    let edited = svc
        .update_evaluation_spec(
            &spec.id,
            UpdateEvaluationSpec {
                schema_version: Some("1.1".into()),
                expected_revision: Some(spec.revision),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, SpecStatus::ReviewRequired);
    assert_ne!(edited.hash, spec.hash);
    assert_eq!(edited.revision, spec.revision + 1);

    // The buyer's earlier acceptance covered the old hash only.
    let seller = accept(&svc, &spec.id, ActorType::Seller, "seller-1").await;
    assert_eq!(seller.spec.status, SpecStatus::ReviewRequired);

    let buyer = accept(&svc, &spec.id, ActorType::Buyer, "buyer-1").await;
    assert!(buyer.newly_recorded);
    assert_eq!(buyer.spec.status, SpecStatus::Frozen);
    assert_eq!(buyer.spec.hash, edited.hash);
}

#[tokio::test]
async fn frozen_spec_cannot_be_edited() {
    let svc = service();
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;

    let err = svc
        .update_evaluation_spec(
            &spec.id,
            UpdateEvaluationSpec {
                schema_version: Some("2.0".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(
        svc.get_evaluation_spec(&spec.id).await.unwrap().status,
        SpecStatus::Frozen
    );
}

#[tokio::test]
async fn status_patch_cannot_freeze() {
    let svc = service();
    let snapshot = snapshot(&svc, "write a memo", json!({})).await;
    let spec = draft_spec(&svc, &snapshot).await;

    let err = svc
        .update_evaluation_spec(
            &spec.id,
            UpdateEvaluationSpec {
                status: Some(SpecStatus::Frozen),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let reviewed = svc
        .update_evaluation_spec(
            &spec.id,
            UpdateEvaluationSpec {
                status: Some(SpecStatus::ReviewRequired),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reviewed.status, SpecStatus::ReviewRequired);
    assert_eq!(reviewed.hash, spec.hash);
}

#[tokio::test]
async fn recency_constraint_reaches_the_spec() {
    let svc = service();
    let snapshot = snapshot(&svc, "rank vendors", json!({"recencyDays": 14})).await;
    let spec = draft_spec(&svc, &snapshot).await;
    assert_eq!(spec.spec.evidence_policy.recency_days, Some(14));
    assert!(spec.verify_hash());
}
