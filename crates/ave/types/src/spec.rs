//! Evaluation contract types.

use crate::error::TypesError;
use crate::hash::ContentHash;
use crate::ids::{AcceptanceEventId, SnapshotId, SpecId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Shape family of the expected output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableType {
    RankedTable,
    Memo,
}

impl DeliverableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RankedTable => "ranked_table",
            Self::Memo => "memo",
        }
    }
}

impl fmt::Display for DeliverableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliverableType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranked_table" => Ok(Self::RankedTable),
            "memo" => Ok(Self::Memo),
            other => Err(TypesError::InvalidSpecBody(format!(
                "unknown deliverable type '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of an evaluation spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecStatus {
    Draft,
    ReviewRequired,
    Frozen,
}

impl SpecStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::ReviewRequired => "REVIEW_REQUIRED",
            Self::Frozen => "FROZEN",
        }
    }
}

impl fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "REVIEW_REQUIRED" => Ok(Self::ReviewRequired),
            "FROZEN" => Ok(Self::Frozen),
            other => Err(TypesError::InvalidSpecBody(format!(
                "unknown spec status '{other}'"
            ))),
        }
    }
}

/// The party recording an acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Buyer,
    Seller,
}

impl ActorType {
    pub const ALL: [ActorType; 2] = [ActorType::Buyer, ActorType::Seller];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            other => Err(TypesError::InvalidSpecBody(format!(
                "unknown actor type '{other}'"
            ))),
        }
    }
}

/// Score thresholds for the final verdict.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DecisionPolicy {
    /// Scores at or above this accept (when gates pass).
    #[serde(alias = "accept_at")]
    pub accept_at: f64,
    /// Scores at or below this reject.
    #[serde(alias = "reject_below")]
    pub reject_below: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            accept_at: 0.8,
            reject_below: 0.5,
        }
    }
}

/// Static per-dimension weights.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub structure: f64,
    pub evidence: f64,
    pub freshness: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            structure: 0.5,
            evidence: 0.25,
            freshness: 0.25,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidencePolicy {
    #[serde(default = "default_true", alias = "evidence_required")]
    pub evidence_required: bool,
    #[serde(default = "default_true", alias = "claim_ids_required")]
    pub claim_ids_required: bool,
    /// Freshness is unenforced when absent.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "recency_days")]
    pub recency_days: Option<u32>,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            evidence_required: true,
            claim_ids_required: true,
            recency_days: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Structured body of an evaluation spec.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecBody {
    pub deliverable_type: DeliverableType,
    /// Structural schema of the expected delivery.
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub decision_policy: DecisionPolicy,
    #[serde(default)]
    pub scoring_weights: ScoringWeights,
    #[serde(default)]
    pub evidence_policy: EvidencePolicy,
}

impl SpecBody {
    /// Reject thresholds or weights the inspector could not use.
    pub fn validate(&self) -> Result<(), TypesError> {
        let DecisionPolicy {
            accept_at,
            reject_below,
        } = self.decision_policy;
        for (name, value) in [("acceptAt", accept_at), ("rejectBelow", reject_below)] {
            check_unit_interval(name, value)?;
        }
        if reject_below > accept_at {
            return Err(TypesError::InvalidSpecBody(format!(
                "rejectBelow ({reject_below}) must not exceed acceptAt ({accept_at})"
            )));
        }

        let w = self.scoring_weights;
        for (name, value) in [
            ("structure", w.structure),
            ("evidence", w.evidence),
            ("freshness", w.freshness),
        ] {
            check_unit_interval(name, value)?;
        }

        if self.evidence_policy.recency_days == Some(0) {
            return Err(TypesError::InvalidSpecBody(
                "recencyDays must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), TypesError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(TypesError::InvalidSpecBody(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

/// Structured, versioned evaluation contract compiled from a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSpec {
    pub id: SpecId,
    pub snapshot_id: SnapshotId,
    pub status: SpecStatus,
    pub deliverable_type: DeliverableType,
    pub spec: SpecBody,
    pub schema_version: String,
    pub hash: ContentHash,
    pub translator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translator_prompt_hash: Option<String>,
    /// Optimistic concurrency token; bumped on every persisted mutation.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationSpec {
    /// Hash over `{spec, schemaVersion}`.
    pub fn compute_hash(body: &SpecBody, schema_version: &str) -> Result<ContentHash, TypesError> {
        let mut content = Map::new();
        content.insert("spec".into(), serde_json::to_value(body)?);
        content.insert(
            "schemaVersion".into(),
            Value::String(schema_version.to_string()),
        );
        Ok(ContentHash::of_value(&Value::Object(content)))
    }

    /// Recompute `hash` after a body or schema-version edit.
    pub fn rehash(&mut self) -> Result<(), TypesError> {
        self.hash = Self::compute_hash(&self.spec, &self.schema_version)?;
        Ok(())
    }

    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(&self.spec, &self.schema_version)
            .map(|computed| computed == self.hash)
            .unwrap_or(false)
    }

    pub fn is_frozen(&self) -> bool {
        self.status == SpecStatus::Frozen
    }
}

/// Append-only acceptance record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecAcceptanceEvent {
    pub id: AcceptanceEventId,
    pub spec_id: SpecId,
    pub actor_type: ActorType,
    pub actor_id: String,
    /// Revision of the spec body that was accepted.
    pub spec_hash: ContentHash,
    pub accepted_at: DateTime<Utc>,
}

impl SpecAcceptanceEvent {
    pub fn new(
        spec: &EvaluationSpec,
        actor_type: ActorType,
        actor_id: impl Into<String>,
        accepted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AcceptanceEventId::generate(),
            spec_id: spec.id.clone(),
            actor_type,
            actor_id: actor_id.into(),
            spec_hash: spec.hash,
            accepted_at,
        }
    }
}
