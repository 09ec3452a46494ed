//! Shared fixtures for the end-to-end scenarios. Everything runs against
//! the in-memory backend.

#![allow(dead_code)]

use ave_engine::TranslatorConfig;
use ave_service::{
    AcceptEvaluationSpec, AcceptanceOutcome, CreateAskSnapshot, CreateEvaluationSpec,
    CreateEvidenceBundle, CreateNormalizedDelivery, CreateVerificationJob, NewEvidenceItem,
    VerificationService,
};
use ave_storage::InMemoryVerifyStorage;
use ave_types::{
    ActorType, AskSnapshot, BundleId, EvaluationSpec, EvidenceBundle, EvidenceItem,
    EvidenceItemId, EvidenceType, NormalizedDelivery, OwnerRef, SpecId, SpecStatus,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub fn service() -> VerificationService {
    VerificationService::new(
        Arc::new(InMemoryVerifyStorage::new()),
        TranslatorConfig::default(),
    )
}

pub async fn snapshot(
    svc: &VerificationService,
    ask_text: &str,
    constraints: Value,
) -> AskSnapshot {
    let derived_constraints: Map<String, Value> = match constraints {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    svc.create_ask_snapshot(CreateAskSnapshot {
        owner: OwnerRef::new("agent", "buyer-1"),
        ask_text: ask_text.to_string(),
        derived_constraints,
        buyer_context: Map::new(),
        attachments: vec![],
    })
    .await
    .unwrap()
}

pub async fn draft_spec(svc: &VerificationService, snapshot: &AskSnapshot) -> EvaluationSpec {
    svc.create_evaluation_spec(CreateEvaluationSpec::new(snapshot.id.clone()))
        .await
        .unwrap()
}

pub async fn accept(
    svc: &VerificationService,
    spec_id: &SpecId,
    actor_type: ActorType,
    actor_id: &str,
) -> AcceptanceOutcome {
    svc.accept_evaluation_spec(
        spec_id,
        AcceptEvaluationSpec {
            actor_type,
            actor_id: actor_id.to_string(),
        },
    )
    .await
    .unwrap()
}

/// Compile a spec for `ask_text` and have both sides accept it.
pub async fn frozen_spec(
    svc: &VerificationService,
    ask_text: &str,
    constraints: Value,
) -> EvaluationSpec {
    let snapshot = snapshot(svc, ask_text, constraints).await;
    let spec = draft_spec(svc, &snapshot).await;
    accept(svc, &spec.id, ActorType::Buyer, "buyer-1").await;
    let outcome = accept(svc, &spec.id, ActorType::Seller, "seller-1").await;
    assert_eq!(outcome.spec.status, SpecStatus::Frozen);
    outcome.spec
}

/// Two vendors, both citing `ev1`, without claim ids.
pub fn vendor_table() -> Value {
    json!({
        "items": [
            {"entity": "A", "rank": 1, "evidenceRefs": ["ev1"]},
            {"entity": "B", "rank": 2, "evidenceRefs": ["ev1"]}
        ]
    })
}

pub async fn deliver(
    svc: &VerificationService,
    spec: &EvaluationSpec,
    raw_payload: Value,
) -> (NormalizedDelivery, EvidenceBundle) {
    let delivery = svc
        .create_normalized_delivery(CreateNormalizedDelivery {
            spec_id: spec.id.clone(),
            raw_payload,
        })
        .await
        .unwrap();
    let bundle = svc
        .create_evidence_bundle(CreateEvidenceBundle {
            spec_id: spec.id.clone(),
            delivery_id: delivery.id.clone(),
        })
        .await
        .unwrap();
    (delivery, bundle)
}

pub fn evidence(id: &str, observed_at: Option<DateTime<Utc>>) -> NewEvidenceItem {
    NewEvidenceItem {
        id: Some(EvidenceItemId::new(id)),
        evidence_type: EvidenceType::UrlSnapshot,
        uri: format!("https://evidence.example/{id}"),
        content_hash: format!("sha256-{id}"),
        observed_at,
        metadata: Map::new(),
    }
}

pub async fn add_evidence(
    svc: &VerificationService,
    bundle_id: &BundleId,
    id: &str,
    observed_at: Option<DateTime<Utc>>,
) -> EvidenceItem {
    svc.add_evidence_item(bundle_id, evidence(id, observed_at))
        .await
        .unwrap()
}

pub fn job_request(
    spec: &EvaluationSpec,
    delivery: &NormalizedDelivery,
    bundle: &EvidenceBundle,
) -> CreateVerificationJob {
    CreateVerificationJob {
        spec_id: spec.id.clone(),
        delivery_id: delivery.id.clone(),
        bundle_id: bundle.id.clone(),
    }
}
