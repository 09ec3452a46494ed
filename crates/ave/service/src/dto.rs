//! Request and response shapes for service operations.
//!
//! Requests deserialize from camelCase JSON and are validated before any
//! state is touched.

use crate::error::{ServiceError, ServiceResult};
use ave_types::{
    ActorType, BundleId, DeliverableType, DeliveryId, EvaluationSpec, EvidenceItemId,
    EvidenceType, OwnerRef, SnapshotId, SpecAcceptanceEvent, SpecBody, SpecId, SpecStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn require(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn require_if_present(field: &str, value: Option<&str>) -> ServiceResult<()> {
    value.map_or(Ok(()), |v| require(field, v))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAskSnapshot {
    pub owner: OwnerRef,
    pub ask_text: String,
    #[serde(default)]
    pub derived_constraints: Map<String, Value>,
    #[serde(default)]
    pub buyer_context: Map<String, Value>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl CreateAskSnapshot {
    pub fn validate(&self) -> ServiceResult<()> {
        require("owner.ownerType", &self.owner.owner_type)?;
        require("owner.ownerId", &self.owner.owner_id)?;
        require("askText", &self.ask_text)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvaluationSpec {
    pub snapshot_id: SnapshotId,
    #[serde(default)]
    pub deliverable_type: Option<DeliverableType>,
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub translator_id: Option<String>,
    #[serde(default)]
    pub translator_prompt_hash: Option<String>,
}

impl CreateEvaluationSpec {
    pub fn new(snapshot_id: SnapshotId) -> Self {
        Self {
            snapshot_id,
            deliverable_type: None,
            schema_version: None,
            translator_id: None,
            translator_prompt_hash: None,
        }
    }

    pub fn validate(&self) -> ServiceResult<()> {
        require("snapshotId", self.snapshot_id.as_str())?;
        require_if_present("schemaVersion", self.schema_version.as_deref())?;
        require_if_present("translatorId", self.translator_id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvaluationSpec {
    #[serde(default)]
    pub status: Option<SpecStatus>,
    #[serde(default)]
    pub spec: Option<SpecBody>,
    #[serde(default)]
    pub schema_version: Option<String>,
    /// Reject the update unless the stored revision still matches.
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

impl UpdateEvaluationSpec {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.status.is_none() && self.spec.is_none() && self.schema_version.is_none() {
            return Err(ServiceError::validation("update contains no changes"));
        }
        require_if_present("schemaVersion", self.schema_version.as_deref())?;
        if let Some(body) = &self.spec {
            body.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptEvaluationSpec {
    pub actor_type: ActorType,
    pub actor_id: String,
}

impl AcceptEvaluationSpec {
    pub fn validate(&self) -> ServiceResult<()> {
        require("actorId", &self.actor_id)
    }
}

/// Result of an acceptance call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceOutcome {
    pub event: SpecAcceptanceEvent,
    /// Spec after the acceptance, frozen if both sides have now accepted.
    pub spec: EvaluationSpec,
    /// False when an identical acceptance was already on record.
    pub newly_recorded: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNormalizedDelivery {
    pub spec_id: SpecId,
    pub raw_payload: Value,
}

impl CreateNormalizedDelivery {
    pub fn validate(&self) -> ServiceResult<()> {
        require("specId", self.spec_id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvidenceBundle {
    pub spec_id: SpecId,
    pub delivery_id: DeliveryId,
}

impl CreateEvidenceBundle {
    pub fn validate(&self) -> ServiceResult<()> {
        require("specId", self.spec_id.as_str())?;
        require("deliveryId", self.delivery_id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvidenceItem {
    /// Caller-chosen id, cited by deliveries. Generated when absent.
    #[serde(default)]
    pub id: Option<EvidenceItemId>,
    pub evidence_type: EvidenceType,
    pub uri: String,
    pub content_hash: String,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewEvidenceItem {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(id) = &self.id {
            require("id", id.as_str())?;
        }
        require("uri", &self.uri)?;
        require("contentHash", &self.content_hash)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVerificationJob {
    pub spec_id: SpecId,
    pub delivery_id: DeliveryId,
    pub bundle_id: BundleId,
}

impl CreateVerificationJob {
    pub fn validate(&self) -> ServiceResult<()> {
        require("specId", self.spec_id.as_str())?;
        require("deliveryId", self.delivery_id.as_str())?;
        require("bundleId", self.bundle_id.as_str())
    }
}
