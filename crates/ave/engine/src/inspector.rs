//! Deterministic verdict over a normalized delivery and its evidence.
//!
//! Three hard gates (structure, evidence, frozen spec) and three weighted
//! dimension scores (structure, evidence coverage, freshness). The inspector
//! is pure: same inputs and `now` always produce the same report.

use crate::normalizer::Normalizer;
use ave_types::{
    ClaimRef, Decision, DecisionPolicy, DeliverableType, DeliveryBody, DimensionScores,
    EvaluationSpec, EvidenceBundle, EvidenceItem, FreshnessSummary, GateOutcomes,
    InspectionReport, NormalizedDelivery, ReportCounts, SpecStatus,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

const MS_PER_DAY: i64 = 86_400_000;

/// Threshold rule shared by every deliverable type.
///
/// Failed gates always reject. Otherwise `score <= rejectBelow` rejects,
/// `score >= acceptAt` accepts and anything in between escalates.
pub fn decide(score: f64, gates_passed: bool, policy: &DecisionPolicy) -> Decision {
    if !gates_passed || score <= policy.reject_below {
        Decision::Reject
    } else if score >= policy.accept_at {
        Decision::Accept
    } else {
        Decision::Escalate
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Inspector;

#[derive(Debug)]
struct StructureCheck {
    passed: bool,
    failure: Option<String>,
}

#[derive(Debug)]
struct EvidenceCheck {
    passed: bool,
    coverage: f64,
    claims_total: usize,
    claims_covered: usize,
    claims_missing_id: usize,
    failure: Option<String>,
}

#[derive(Debug)]
struct FreshnessCheck {
    score: f64,
    fresh: usize,
    summary: FreshnessSummary,
}

impl Inspector {
    pub fn inspect(
        &self,
        spec: &EvaluationSpec,
        delivery: &NormalizedDelivery,
        bundle: &EvidenceBundle,
        items: &[EvidenceItem],
        now: DateTime<Utc>,
    ) -> InspectionReport {
        let structure = Self::check_structure(spec.deliverable_type, delivery);

        // The stored payload is already canonical, so this decode is lossless
        // whenever the strict one succeeds.
        let body = Normalizer::decode(delivery.deliverable_type, &delivery.normalized_payload);
        let evidence = Self::check_evidence(spec, &body.claims(), items);
        let freshness = Self::check_freshness(spec, items, now);

        let spec_frozen = spec.status == SpecStatus::Frozen;
        let gates = GateOutcomes {
            structure: structure.passed,
            evidence: evidence.passed,
            spec_frozen,
        };
        let gates_passed = gates.all_passed();

        let mut gate_failures = Vec::new();
        gate_failures.extend(structure.failure);
        gate_failures.extend(evidence.failure);
        if !spec_frozen {
            gate_failures.push(format!(
                "spec {} is {}, verification requires FROZEN",
                spec.id, spec.status
            ));
        }

        let scores = DimensionScores {
            structure: if structure.passed { 1.0 } else { 0.0 },
            evidence: evidence.coverage,
            freshness: freshness.score,
        };
        let weights = spec.spec.scoring_weights;
        let score = scores.structure * weights.structure
            + scores.evidence * weights.evidence
            + scores.freshness * weights.freshness;
        let policy = spec.spec.decision_policy;
        let decision = decide(score, gates_passed, &policy);

        debug!(
            spec_id = %spec.id,
            delivery_id = %delivery.id,
            bundle_id = %bundle.id,
            score,
            gates_passed,
            decision = %decision,
            "Inspection complete"
        );

        InspectionReport {
            spec_id: spec.id.clone(),
            spec_hash: spec.hash,
            spec_status: spec.status,
            delivery_id: delivery.id.clone(),
            delivery_hash: delivery.hash,
            bundle_id: bundle.id.clone(),
            deliverable_type: spec.deliverable_type,
            gates,
            gates_passed,
            gate_failures,
            scores,
            weights,
            policy,
            freshness: freshness.summary,
            counts: ReportCounts {
                claims_total: evidence.claims_total,
                claims_covered: evidence.claims_covered,
                claims_missing_id: evidence.claims_missing_id,
                evidence_total: items.len(),
                evidence_fresh: freshness.fresh,
            },
            score,
            decision,
            evaluated_at: now,
        }
    }

    fn check_structure(expected: DeliverableType, delivery: &NormalizedDelivery) -> StructureCheck {
        let fail = |reason: String| StructureCheck {
            passed: false,
            failure: Some(format!("structure: {reason}")),
        };

        if delivery.deliverable_type != expected {
            return fail(format!(
                "delivery is {} but spec expects {expected}",
                delivery.deliverable_type
            ));
        }

        match DeliveryBody::decode_strict(expected, &delivery.normalized_payload) {
            Err(err) => fail(err.to_string()),
            Ok(DeliveryBody::RankedTable(table)) => {
                if table.items.is_empty() {
                    return fail("ranked table has no items".to_string());
                }
                let incomplete = table
                    .items
                    .iter()
                    .filter(|item| item.claim_id.trim().is_empty() || item.entity.trim().is_empty())
                    .count();
                if incomplete > 0 {
                    return fail(format!("{incomplete} item(s) missing claimId or entity"));
                }
                StructureCheck {
                    passed: true,
                    failure: None,
                }
            }
            Ok(DeliveryBody::Memo(_)) => StructureCheck {
                passed: true,
                failure: None,
            },
        }
    }

    fn check_evidence(
        spec: &EvaluationSpec,
        claims: &[ClaimRef<'_>],
        items: &[EvidenceItem],
    ) -> EvidenceCheck {
        let policy = &spec.spec.evidence_policy;
        let claims_total = claims.len();
        let claims_missing_id = claims.iter().filter(|c| !c.has_claim_id()).count();

        if policy.claim_ids_required && claims_missing_id > 0 {
            return EvidenceCheck {
                passed: false,
                coverage: 0.0,
                claims_total,
                claims_covered: 0,
                claims_missing_id,
                failure: Some(format!(
                    "evidence: {claims_missing_id} claim(s) have no claimId"
                )),
            };
        }

        let known: HashSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let claims_covered = claims
            .iter()
            .filter(|claim| claim.references.iter().any(|r| known.contains(r)))
            .count();
        let coverage = if claims_total == 0 {
            0.0
        } else {
            claims_covered as f64 / claims_total as f64
        };

        let passed = !policy.evidence_required || !items.is_empty();
        EvidenceCheck {
            passed,
            coverage,
            claims_total,
            claims_covered,
            claims_missing_id,
            failure: (!passed)
                .then(|| "evidence: policy requires evidence but the bundle is empty".to_string()),
        }
    }

    fn check_freshness(
        spec: &EvaluationSpec,
        items: &[EvidenceItem],
        now: DateTime<Utc>,
    ) -> FreshnessCheck {
        let Some(days) = spec.spec.evidence_policy.recency_days else {
            return FreshnessCheck {
                score: 1.0,
                fresh: 0,
                summary: FreshnessSummary {
                    enforced: false,
                    recency_days: None,
                },
            };
        };

        let max_age = Duration::milliseconds(i64::from(days) * MS_PER_DAY);
        let fresh = items
            .iter()
            .filter(|item| item.is_fresh(now, max_age))
            .count();
        let score = if items.is_empty() {
            0.0
        } else {
            fresh as f64 / items.len() as f64
        };

        FreshnessCheck {
            score,
            fresh,
            summary: FreshnessSummary {
                enforced: true,
                recency_days: Some(days),
            },
        }
    }
}
