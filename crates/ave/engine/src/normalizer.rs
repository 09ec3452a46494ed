//! Canonicalizes raw delivery payloads.
//!
//! Decoding is total: any JSON value maps to a [`DeliveryBody`]. Missing or
//! malformed fields get documented defaults instead of errors, and
//! normalizing an already normalized payload is a fixed point.
//!
//! Defaults (positions are 1-based in input order):
//!
//! | field                    | default / coercion                                   |
//! |--------------------------|------------------------------------------------------|
//! | `items`, `sources`       | non-array => `[]`                                    |
//! | `claimId`                | string kept, number rendered, else `claim-{pos}`     |
//! | `entity`, `title`, ...   | string kept, number/bool rendered, else `""`         |
//! | `rank`                   | finite number kept, else `pos`                       |
//! | `metrics`                | object kept, else `{}`                               |
//! | `evidenceRefs`           | string elements of an array, else `[]`               |
//! | `findings`               | strings kept, numbers/bools rendered, rest dropped   |
//! | bare string source       | taken as its `reference`                             |

use crate::error::EngineError;
use ave_types::{
    ContentHash, DeliverableType, DeliveryBody, DeliveryId, EvaluationSpec, MemoBody, MemoSource,
    NormalizedDelivery, RankedItem, RankedTableBody,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Normalize `raw` against the spec it targets. `raw` is kept verbatim.
    pub fn normalize(
        &self,
        spec: &EvaluationSpec,
        raw: Value,
        now: DateTime<Utc>,
    ) -> Result<NormalizedDelivery, EngineError> {
        let normalized_payload = Self::normalize_payload(spec.deliverable_type, &raw)?;
        let hash = ContentHash::of_value(&normalized_payload);
        Ok(NormalizedDelivery {
            id: DeliveryId::generate(),
            spec_id: spec.id.clone(),
            deliverable_type: spec.deliverable_type,
            raw_payload: raw,
            normalized_payload,
            schema_version: spec.schema_version.clone(),
            hash,
            created_at: now,
        })
    }

    /// Wire form of the canonical body.
    pub fn normalize_payload(
        deliverable_type: DeliverableType,
        raw: &Value,
    ) -> Result<Value, EngineError> {
        Ok(Self::decode(deliverable_type, raw).to_value()?)
    }

    /// Total decode of any JSON into the typed body.
    pub fn decode(deliverable_type: DeliverableType, raw: &Value) -> DeliveryBody {
        match deliverable_type {
            DeliverableType::RankedTable => DeliveryBody::RankedTable(decode_ranked_table(raw)),
            DeliverableType::Memo => DeliveryBody::Memo(decode_memo(raw)),
        }
    }
}

fn decode_ranked_table(raw: &Value) -> RankedTableBody {
    let empty = Map::new();
    let mut items: Vec<RankedItem> = array_field(raw, "items")
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let position = idx + 1;
            let fields = item.as_object().unwrap_or(&empty);
            RankedItem {
                claim_id: claim_id(fields.get("claimId"), position),
                entity: scalar_text(fields.get("entity")).unwrap_or_default(),
                rank: fields
                    .get("rank")
                    .and_then(Value::as_f64)
                    .filter(|r| r.is_finite())
                    .unwrap_or(position as f64),
                metrics: fields
                    .get("metrics")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                evidence_refs: fields
                    .get("evidenceRefs")
                    .and_then(Value::as_array)
                    .map(|refs| {
                        refs.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect();

    // Stable: equal ranks keep input order.
    items.sort_by(|a, b| a.rank.total_cmp(&b.rank));
    RankedTableBody { items }
}

fn decode_memo(raw: &Value) -> MemoBody {
    let field = |name: &str| raw.get(name);

    let findings = array_field(raw, "findings")
        .iter()
        .filter_map(|finding| scalar_text(Some(finding)))
        .collect();

    let sources = array_field(raw, "sources")
        .iter()
        .enumerate()
        .map(|(idx, source)| {
            let position = idx + 1;
            match source {
                Value::Object(fields) => MemoSource {
                    claim_id: claim_id(fields.get("claimId"), position),
                    reference: scalar_text(fields.get("reference")).unwrap_or_default(),
                },
                Value::String(reference) => MemoSource {
                    claim_id: default_claim_id(position),
                    reference: reference.clone(),
                },
                _ => MemoSource {
                    claim_id: default_claim_id(position),
                    reference: String::new(),
                },
            }
        })
        .collect();

    MemoBody {
        title: scalar_text(field("title")).unwrap_or_default(),
        summary: scalar_text(field("summary")).unwrap_or_default(),
        findings,
        sources,
    }
}

fn array_field<'a>(raw: &'a Value, name: &str) -> &'a [Value] {
    raw.get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn default_claim_id(position: usize) -> String {
    format!("claim-{position}")
}

/// Strings are kept verbatim, including empty ones, so the inspector can
/// still see a deliberately blank claim id.
fn claim_id(value: Option<&Value>, position: usize) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default_claim_id(position),
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
