use crate::error::TypesError;
use crate::hash::ContentHash;
use crate::ids::{BundleId, DeliveryId, JobId, ReportId, SpecId};
use crate::spec::{DecisionPolicy, DeliverableType, ScoringWeights, SpecStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
    Escalate,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard pass/fail preconditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateOutcomes {
    pub structure: bool,
    pub evidence: bool,
    pub spec_frozen: bool,
}

impl GateOutcomes {
    pub fn all_passed(&self) -> bool {
        self.structure && self.evidence && self.spec_frozen
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScores {
    pub structure: f64,
    pub evidence: f64,
    pub freshness: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCounts {
    pub claims_total: usize,
    pub claims_covered: usize,
    pub claims_missing_id: usize,
    pub evidence_total: usize,
    pub evidence_fresh: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessSummary {
    pub enforced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recency_days: Option<u32>,
}

/// Full audit body produced by the inspector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub spec_id: SpecId,
    pub spec_hash: ContentHash,
    pub spec_status: SpecStatus,
    pub delivery_id: DeliveryId,
    pub delivery_hash: ContentHash,
    pub bundle_id: BundleId,
    pub deliverable_type: DeliverableType,
    pub gates: GateOutcomes,
    pub gates_passed: bool,
    /// Human-readable reasons for every failed gate.
    #[serde(default)]
    pub gate_failures: Vec<String>,
    pub scores: DimensionScores,
    pub weights: ScoringWeights,
    pub policy: DecisionPolicy,
    pub freshness: FreshnessSummary,
    pub counts: ReportCounts,
    pub score: f64,
    pub decision: Decision,
    pub evaluated_at: DateTime<Utc>,
}

/// Persisted outcome of a verification job. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub id: ReportId,
    pub job_id: JobId,
    pub decision: Decision,
    pub score: f64,
    pub gates_passed: bool,
    pub report: InspectionReport,
    /// Canonical hash of `report`.
    pub hash: ContentHash,
    pub created_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn from_inspection(
        job_id: JobId,
        report: InspectionReport,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TypesError> {
        let hash = ContentHash::of_serializable(&report)?;
        Ok(Self {
            id: ReportId::generate(),
            job_id,
            decision: report.decision,
            score: report.score,
            gates_passed: report.gates_passed,
            report,
            hash,
            created_at,
        })
    }

    pub fn verify_hash(&self) -> bool {
        ContentHash::of_serializable(&self.report)
            .map(|computed| computed == self.hash)
            .unwrap_or(false)
    }
}
