use crate::error::TypesError;
use crate::hash::ContentHash;
use crate::ids::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// External identity that owns a snapshot. Opaque to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }
}

/// Immutable capture of a buyer's request at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskSnapshot {
    pub id: SnapshotId,
    pub owner: OwnerRef,
    pub ask_text: String,
    #[serde(default)]
    pub derived_constraints: Map<String, Value>,
    #[serde(default)]
    pub buyer_context: Map<String, Value>,
    #[serde(default)]
    pub attachments: Vec<Value>,
    pub hash: ContentHash,
    pub created_at: DateTime<Utc>,
}

impl AskSnapshot {
    pub fn new(
        owner: OwnerRef,
        ask_text: impl Into<String>,
        derived_constraints: Map<String, Value>,
        buyer_context: Map<String, Value>,
        attachments: Vec<Value>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TypesError> {
        let ask_text = ask_text.into();
        let hash = Self::compute_hash(
            &owner,
            &ask_text,
            &derived_constraints,
            &buyer_context,
            &attachments,
        )?;
        Ok(Self {
            id: SnapshotId::generate(),
            owner,
            ask_text,
            derived_constraints,
            buyer_context,
            attachments,
            hash,
            created_at,
        })
    }

    fn compute_hash(
        owner: &OwnerRef,
        ask_text: &str,
        derived_constraints: &Map<String, Value>,
        buyer_context: &Map<String, Value>,
        attachments: &[Value],
    ) -> Result<ContentHash, TypesError> {
        let mut content = Map::new();
        content.insert("owner".into(), serde_json::to_value(owner)?);
        content.insert("askText".into(), Value::String(ask_text.to_string()));
        content.insert(
            "derivedConstraints".into(),
            Value::Object(derived_constraints.clone()),
        );
        content.insert("buyerContext".into(), Value::Object(buyer_context.clone()));
        content.insert("attachments".into(), Value::Array(attachments.to_vec()));
        Ok(ContentHash::of_value(&Value::Object(content)))
    }

    /// Recompute the content hash and compare with the stored one.
    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(
            &self.owner,
            &self.ask_text,
            &self.derived_constraints,
            &self.buyer_context,
            &self.attachments,
        )
        .map(|computed| computed == self.hash)
        .unwrap_or(false)
    }

    /// Positive integer `recencyDays` constraint, if the buyer stated one.
    pub fn recency_days(&self) -> Option<u32> {
        self.derived_constraints
            .get("recencyDays")
            .and_then(Value::as_u64)
            .filter(|days| *days > 0)
            .and_then(|days| u32::try_from(days).ok())
    }
}
