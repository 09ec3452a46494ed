//! Compiles an ask snapshot into an evaluation spec skeleton.
//!
//! Classification is a keyword heuristic, not a hard constraint: callers may
//! always pin the deliverable type explicitly.

use crate::error::EngineError;
use ave_types::{
    AskSnapshot, DecisionPolicy, DeliverableType, EvaluationSpec, EvidencePolicy, ScoringWeights,
    SpecBody, SpecId, SpecStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const RANKING_KEYWORDS: [&str; 3] = ["rank", "best", "top"];

/// Defaults stamped onto every compiled spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorConfig {
    /// Provenance id recorded when the caller does not name a translator.
    pub translator_id: String,
    pub schema_version: String,
    pub decision_policy: DecisionPolicy,
    pub scoring_weights: ScoringWeights,
    pub evidence_policy: EvidencePolicy,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            translator_id: "ave-keyword-translator/1".to_string(),
            schema_version: "1.0".to_string(),
            decision_policy: DecisionPolicy::default(),
            scoring_weights: ScoringWeights::default(),
            evidence_policy: EvidencePolicy::default(),
        }
    }
}

impl TranslatorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.translator_id.trim().is_empty() {
            return Err(EngineError::validation("translator_id must not be blank"));
        }
        if self.schema_version.trim().is_empty() {
            return Err(EngineError::validation("schema_version must not be blank"));
        }
        // Reuse the body rules so configured defaults can never produce an invalid spec.
        SpecBody {
            deliverable_type: DeliverableType::Memo,
            schema: Value::Null,
            decision_policy: self.decision_policy,
            scoring_weights: self.scoring_weights,
            evidence_policy: self.evidence_policy,
        }
        .validate()?;
        Ok(())
    }
}

/// Per-call overrides and provenance.
#[derive(Debug, Clone, Default)]
pub struct TranslateRequest {
    pub deliverable_type: Option<DeliverableType>,
    pub schema_version: Option<String>,
    pub translator_id: Option<String>,
    pub translator_prompt_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: TranslatorConfig,
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// `rank`, `best` or `top` anywhere in the text (any case) selects a
    /// ranked table; everything else is a memo.
    pub fn classify(text: &str) -> DeliverableType {
        let lowered = text.to_lowercase();
        if RANKING_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            DeliverableType::RankedTable
        } else {
            DeliverableType::Memo
        }
    }

    /// Structural schema the delivery must satisfy.
    pub fn schema_for(deliverable_type: DeliverableType) -> Value {
        match deliverable_type {
            DeliverableType::RankedTable => json!({
                "type": "object",
                "required": ["items"],
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["claimId", "entity", "rank"],
                            "properties": {
                                "claimId": {"type": "string"},
                                "entity": {"type": "string"},
                                "rank": {"type": "number"},
                                "metrics": {"type": "object"},
                                "evidenceRefs": {"type": "array", "items": {"type": "string"}}
                            }
                        }
                    }
                }
            }),
            DeliverableType::Memo => json!({
                "type": "object",
                "required": ["title", "summary", "findings", "sources"],
                "properties": {
                    "title": {"type": "string"},
                    "summary": {"type": "string"},
                    "findings": {"type": "array", "items": {"type": "string"}},
                    "sources": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["claimId", "reference"],
                            "properties": {
                                "claimId": {"type": "string"},
                                "reference": {"type": "string"}
                            }
                        }
                    }
                }
            }),
        }
    }

    /// Default body for a deliverable type, before snapshot constraints.
    pub fn default_body(&self, deliverable_type: DeliverableType) -> SpecBody {
        SpecBody {
            deliverable_type,
            schema: Self::schema_for(deliverable_type),
            decision_policy: self.config.decision_policy,
            scoring_weights: self.config.scoring_weights,
            evidence_policy: self.config.evidence_policy,
        }
    }

    /// Compile a DRAFT spec. Pure: persistence is the caller's concern.
    pub fn compile(
        &self,
        snapshot: &AskSnapshot,
        request: TranslateRequest,
        now: DateTime<Utc>,
    ) -> Result<EvaluationSpec, EngineError> {
        if snapshot.ask_text.trim().is_empty() {
            return Err(EngineError::validation("snapshot ask text is blank"));
        }

        let deliverable_type = request
            .deliverable_type
            .unwrap_or_else(|| Self::classify(&snapshot.ask_text));
        let schema_version = non_blank(request.schema_version, "schemaVersion")?
            .unwrap_or_else(|| self.config.schema_version.clone());
        let translator_id = non_blank(request.translator_id, "translatorId")?
            .unwrap_or_else(|| self.config.translator_id.clone());

        let mut body = self.default_body(deliverable_type);
        if let Some(days) = snapshot.recency_days() {
            body.evidence_policy.recency_days = Some(days);
        }
        body.validate()?;

        let hash = EvaluationSpec::compute_hash(&body, &schema_version)?;
        Ok(EvaluationSpec {
            id: SpecId::generate(),
            snapshot_id: snapshot.id.clone(),
            status: SpecStatus::Draft,
            deliverable_type,
            spec: body,
            schema_version,
            hash,
            translator_id,
            translator_prompt_hash: request.translator_prompt_hash,
            revision: 1,
            created_at: now,
            updated_at: now,
        })
    }
}

fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>, EngineError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(EngineError::validation(format!("{field} must not be blank")))
        }
        other => Ok(other),
    }
}
