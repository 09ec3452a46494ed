//! Delivery bodies and the normalized delivery record.
//!
//! The wire form of a delivery is a plain JSON object; internally it is always
//! handled as one of the typed variants of [`DeliveryBody`].

use crate::error::TypesError;
use crate::hash::ContentHash;
use crate::ids::{DeliveryId, SpecId};
use crate::spec::DeliverableType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// One row of a ranked table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    #[serde(default)]
    pub claim_id: String,
    #[serde(default)]
    pub entity: String,
    #[serde(serialize_with = "serialize_rank")]
    pub rank: f64,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

/// Integral ranks go out as JSON integers so `1` and `1.0` hash the same
/// after normalization.
fn serialize_rank<S: Serializer>(rank: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if rank.is_finite() && rank.fract() == 0.0 && rank.abs() < 9.0e15 {
        serializer.serialize_i64(*rank as i64)
    } else {
        serializer.serialize_f64(*rank)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedTableBody {
    pub items: Vec<RankedItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoSource {
    #[serde(default)]
    pub claim_id: String,
    #[serde(default)]
    pub reference: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoBody {
    pub title: String,
    pub summary: String,
    pub findings: Vec<String>,
    pub sources: Vec<MemoSource>,
}

/// A single citable claim inside a delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRef<'a> {
    pub claim_id: &'a str,
    /// Evidence item ids this claim points at.
    pub references: Vec<&'a str>,
}

impl ClaimRef<'_> {
    pub fn has_claim_id(&self) -> bool {
        !self.claim_id.trim().is_empty()
    }
}

/// Typed delivery body, one variant per deliverable type.
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryBody {
    RankedTable(RankedTableBody),
    Memo(MemoBody),
}

impl DeliveryBody {
    pub fn deliverable_type(&self) -> DeliverableType {
        match self {
            Self::RankedTable(_) => DeliverableType::RankedTable,
            Self::Memo(_) => DeliverableType::Memo,
        }
    }

    /// Strict decode: the payload must already conform to the schema of
    /// `deliverable_type`. No defaults are invented for required fields.
    pub fn decode_strict(
        deliverable_type: DeliverableType,
        payload: &Value,
    ) -> Result<Self, TypesError> {
        let shape_err = |err: serde_json::Error| TypesError::ShapeMismatch {
            expected: deliverable_type.to_string(),
            reason: err.to_string(),
        };
        match deliverable_type {
            DeliverableType::RankedTable => RankedTableBody::deserialize(payload)
                .map(Self::RankedTable)
                .map_err(shape_err),
            DeliverableType::Memo => MemoBody::deserialize(payload)
                .map(Self::Memo)
                .map_err(shape_err),
        }
    }

    /// Wire form (plain object, no variant tag).
    pub fn to_value(&self) -> Result<Value, TypesError> {
        let value = match self {
            Self::RankedTable(body) => serde_json::to_value(body)?,
            Self::Memo(body) => serde_json::to_value(body)?,
        };
        Ok(value)
    }

    /// The claim universe: sources of a memo, items of a ranked table.
    pub fn claims(&self) -> Vec<ClaimRef<'_>> {
        match self {
            Self::RankedTable(body) => body
                .items
                .iter()
                .map(|item| ClaimRef {
                    claim_id: &item.claim_id,
                    references: item.evidence_refs.iter().map(String::as_str).collect(),
                })
                .collect(),
            Self::Memo(body) => body
                .sources
                .iter()
                .map(|source| ClaimRef {
                    claim_id: &source.claim_id,
                    references: vec![source.reference.as_str()],
                })
                .collect(),
        }
    }
}

/// Canonical form of a raw delivery, bound to the spec it targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDelivery {
    pub id: DeliveryId,
    pub spec_id: SpecId,
    pub deliverable_type: DeliverableType,
    /// Submitted payload, retained verbatim.
    pub raw_payload: Value,
    pub normalized_payload: Value,
    pub schema_version: String,
    /// Canonical hash of `normalized_payload`.
    pub hash: ContentHash,
    pub created_at: DateTime<Utc>,
}

impl NormalizedDelivery {
    pub fn verify_hash(&self) -> bool {
        ContentHash::of_value(&self.normalized_payload) == self.hash
    }
}
