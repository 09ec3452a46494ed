//! Bilateral acceptance state machine for evaluation specs.
//!
//! `DRAFT -> REVIEW_REQUIRED -> FROZEN`, with `FROZEN` terminal. A spec is
//! frozen as soon as both a buyer and a seller acceptance exist for its
//! current hash. Acceptances recorded against an older revision never count,
//! and editing a spec that already collected acceptances sends it back to
//! review.

use crate::error::EngineError;
use ave_types::{ActorType, EvaluationSpec, SpecAcceptanceEvent, SpecBody, SpecStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Partial update of a non-frozen spec.
#[derive(Debug, Clone, Default)]
pub struct SpecUpdate {
    pub status: Option<SpecStatus>,
    pub spec: Option<SpecBody>,
    pub schema_version: Option<String>,
}

impl SpecUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.spec.is_none() && self.schema_version.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpecLifecycle;

impl SpecLifecycle {
    /// Status moves reachable by edits or acceptance.
    pub fn check_transition(from: SpecStatus, to: SpecStatus) -> Result<(), EngineError> {
        let allowed = match (from, to) {
            (SpecStatus::Frozen, _) => false,
            (a, b) if a == b => true,
            (SpecStatus::Draft, SpecStatus::ReviewRequired)
            | (SpecStatus::ReviewRequired, SpecStatus::Draft)
            | (SpecStatus::Draft, SpecStatus::Frozen)
            | (SpecStatus::ReviewRequired, SpecStatus::Frozen) => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Produce the next revision of `spec`. The returned spec has its hash
    /// recomputed and its revision bumped; persisting it is up to the caller.
    pub fn apply_update(
        spec: &EvaluationSpec,
        update: SpecUpdate,
        acceptances: &[SpecAcceptanceEvent],
        now: DateTime<Utc>,
    ) -> Result<EvaluationSpec, EngineError> {
        if spec.is_frozen() {
            return Err(EngineError::validation(format!(
                "spec {} is frozen and can no longer be edited",
                spec.id
            )));
        }
        if update.is_empty() {
            return Err(EngineError::validation("update contains no changes"));
        }
        if update.status == Some(SpecStatus::Frozen) {
            return Err(EngineError::validation(
                "FROZEN is reached only through buyer and seller acceptance",
            ));
        }

        let mut next = spec.clone();

        if let Some(status) = update.status {
            Self::check_transition(spec.status, status)?;
            next.status = status;
        }

        if let Some(body) = update.spec {
            body.validate()?;
            next.deliverable_type = body.deliverable_type;
            next.spec = body;
        }
        if let Some(version) = update.schema_version {
            if version.trim().is_empty() {
                return Err(EngineError::validation("schemaVersion must not be blank"));
            }
            next.schema_version = version;
        }

        next.rehash()?;
        if next.hash != spec.hash && Self::has_acceptances_for(spec, acceptances) {
            // Prior acceptances covered content that no longer exists.
            next.status = SpecStatus::ReviewRequired;
        }

        next.revision = spec.revision + 1;
        next.updated_at = now;
        Ok(next)
    }

    /// Actor types that accepted the spec's current hash.
    pub fn accepted_actor_types(
        spec: &EvaluationSpec,
        acceptances: &[SpecAcceptanceEvent],
    ) -> BTreeSet<ActorType> {
        acceptances
            .iter()
            .filter(|event| event.spec_id == spec.id && event.spec_hash == spec.hash)
            .map(|event| event.actor_type)
            .collect()
    }

    /// Missing actor types before the spec can freeze.
    pub fn pending_actor_types(
        spec: &EvaluationSpec,
        acceptances: &[SpecAcceptanceEvent],
    ) -> Vec<ActorType> {
        let accepted = Self::accepted_actor_types(spec, acceptances);
        ActorType::ALL
            .into_iter()
            .filter(|actor| !accepted.contains(actor))
            .collect()
    }

    /// Frozen copy of `spec` when both sides accepted its current hash,
    /// `None` when nothing changes.
    pub fn promote_if_accepted(
        spec: &EvaluationSpec,
        acceptances: &[SpecAcceptanceEvent],
        now: DateTime<Utc>,
    ) -> Result<Option<EvaluationSpec>, EngineError> {
        if spec.is_frozen() || !Self::pending_actor_types(spec, acceptances).is_empty() {
            return Ok(None);
        }
        Self::check_transition(spec.status, SpecStatus::Frozen)?;
        let mut frozen = spec.clone();
        frozen.status = SpecStatus::Frozen;
        frozen.revision = spec.revision + 1;
        frozen.updated_at = now;
        Ok(Some(frozen))
    }

    fn has_acceptances_for(spec: &EvaluationSpec, acceptances: &[SpecAcceptanceEvent]) -> bool {
        acceptances
            .iter()
            .any(|event| event.spec_id == spec.id && event.spec_hash == spec.hash)
    }
}
