use crate::ids::{BundleId, DeliveryId, EvidenceItemId, SpecId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    UrlSnapshot,
    File,
}

impl EvidenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlSnapshot => "url_snapshot",
            Self::File => "file",
        }
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cited proof. Content lives at `uri`; only its hash is held here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub id: EvidenceItemId,
    pub bundle_id: BundleId,
    pub evidence_type: EvidenceType,
    pub uri: String,
    pub content_hash: String,
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl EvidenceItem {
    /// Observed within `max_age` of `now`. Items without an observation
    /// time are never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.observed_at
            .map(|observed| now - observed <= max_age)
            .unwrap_or(false)
    }
}

/// Closed evidence set for a `(spec, delivery)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    pub id: BundleId,
    pub spec_id: SpecId,
    pub delivery_id: DeliveryId,
    pub created_at: DateTime<Utc>,
    /// Set once a verification job consumes the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_at: Option<DateTime<Utc>>,
}

impl EvidenceBundle {
    pub fn new(spec_id: SpecId, delivery_id: DeliveryId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: BundleId::generate(),
            spec_id,
            delivery_id,
            created_at,
            sealed_at: None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed_at.is_some()
    }
}
