//! Verification service - the operation surface of AVE.
//!
//! Every operation validates its request, loads what it needs from the
//! injected storage, delegates the decision logic to `ave-engine` and
//! persists the result. Transports (HTTP, queues, CLIs) sit on top of this
//! type and only translate requests and [`ServiceError`] codes.

use crate::config::AveConfig;
use crate::dto::{
    AcceptEvaluationSpec, AcceptanceOutcome, CreateAskSnapshot, CreateEvaluationSpec,
    CreateEvidenceBundle, CreateNormalizedDelivery, CreateVerificationJob, NewEvidenceItem,
    UpdateEvaluationSpec,
};
use crate::error::{ServiceError, ServiceResult};
use crate::orchestrator::{JobOrchestrator, JobOutcome};
use ave_engine::{
    Normalizer, SpecLifecycle, SpecUpdate, TranslateRequest, Translator, TranslatorConfig,
};
use ave_storage::{
    open_storage, AcceptanceStore, DeliveryStore, EvidenceStore, JobStore, ReportStore,
    SnapshotStore, SpecStore, StorageError, StorageLifecycle, VerifyStorage,
};
use ave_types::{
    AskSnapshot, BundleId, DeliveryId, EvaluationSpec, EvidenceBundle, EvidenceItem,
    EvidenceItemId, JobId, NormalizedDelivery, ReportId, SnapshotId, SpecAcceptanceEvent, SpecId,
    VerificationJob, VerificationReport,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Attempts at freezing a spec when its revision moves underneath us.
const PROMOTE_ATTEMPTS: usize = 3;

pub struct VerificationService {
    storage: Arc<dyn VerifyStorage>,
    translator: Translator,
    normalizer: Normalizer,
    orchestrator: JobOrchestrator,
}

impl VerificationService {
    pub fn new(storage: Arc<dyn VerifyStorage>, translator: TranslatorConfig) -> Self {
        Self {
            orchestrator: JobOrchestrator::new(storage.clone()),
            storage,
            translator: Translator::new(translator),
            normalizer: Normalizer,
        }
    }

    /// Open the configured backend and build the service on top of it.
    pub async fn from_config(config: &AveConfig) -> ServiceResult<Self> {
        let storage = open_storage(&config.storage).await?;
        info!(
            backend = storage.backend(),
            translator_id = %config.translator.translator_id,
            "Verification service ready"
        );
        Ok(Self::new(storage, config.translator.clone()))
    }

    pub fn storage(&self) -> &Arc<dyn VerifyStorage> {
        &self.storage
    }

    /// Release the storage backend.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        info!(backend = self.storage.backend(), "Verification service shutting down");
        self.storage.close().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ask snapshots
    // ------------------------------------------------------------------

    #[instrument(skip(self, request), fields(owner_id = %request.owner.owner_id))]
    pub async fn create_ask_snapshot(&self, request: CreateAskSnapshot) -> ServiceResult<AskSnapshot> {
        request.validate()?;
        let snapshot = AskSnapshot::new(
            request.owner,
            request.ask_text,
            request.derived_constraints,
            request.buyer_context,
            request.attachments,
            Utc::now(),
        )?;
        self.storage.insert_snapshot(snapshot.clone()).await?;

        info!(snapshot_id = %snapshot.id, hash = %snapshot.hash, "Ask snapshot created");
        Ok(snapshot)
    }

    pub async fn get_ask_snapshot(&self, id: &SnapshotId) -> ServiceResult<AskSnapshot> {
        self.storage
            .get_snapshot(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("snapshot", id))
    }

    // ------------------------------------------------------------------
    // Evaluation specs
    // ------------------------------------------------------------------

    /// Compile a DRAFT spec from a stored snapshot.
    #[instrument(skip(self, request), fields(snapshot_id = %request.snapshot_id))]
    pub async fn create_evaluation_spec(
        &self,
        request: CreateEvaluationSpec,
    ) -> ServiceResult<EvaluationSpec> {
        request.validate()?;
        let snapshot = self.get_ask_snapshot(&request.snapshot_id).await?;

        let spec = self.translator.compile(
            &snapshot,
            TranslateRequest {
                deliverable_type: request.deliverable_type,
                schema_version: request.schema_version,
                translator_id: request.translator_id,
                translator_prompt_hash: request.translator_prompt_hash,
            },
            Utc::now(),
        )?;
        self.storage.insert_spec(spec.clone()).await?;

        info!(
            spec_id = %spec.id,
            deliverable_type = %spec.deliverable_type,
            hash = %spec.hash,
            "Evaluation spec compiled"
        );
        Ok(spec)
    }

    pub async fn get_evaluation_spec(&self, id: &SpecId) -> ServiceResult<EvaluationSpec> {
        self.storage
            .get_spec(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("spec", id))
    }

    /// Edit a non-frozen spec. The new revision is re-hashed; a spec that
    /// already collected acceptances goes back to review.
    #[instrument(skip(self, request), fields(spec_id = %id))]
    pub async fn update_evaluation_spec(
        &self,
        id: &SpecId,
        request: UpdateEvaluationSpec,
    ) -> ServiceResult<EvaluationSpec> {
        request.validate()?;
        let spec = self.get_evaluation_spec(id).await?;

        if let Some(expected) = request.expected_revision {
            if expected != spec.revision {
                warn!(expected, actual = spec.revision, "Stale spec revision");
                return Err(ServiceError::Conflict(format!(
                    "spec {id} is at revision {}, expected {expected}",
                    spec.revision
                )));
            }
        }

        let acceptances = self.storage.list_acceptances(id).await?;
        let update = SpecUpdate {
            status: request.status,
            spec: request.spec,
            schema_version: request.schema_version,
        };
        let next = match SpecLifecycle::apply_update(&spec, update, &acceptances, Utc::now()) {
            Ok(next) => next,
            Err(err) => {
                warn!(status = %spec.status, error = %err, "Spec update rejected");
                return Err(err.into());
            }
        };
        self.storage.update_spec(next.clone(), spec.revision).await?;

        info!(
            status = %next.status,
            revision = next.revision,
            hash = %next.hash,
            "Evaluation spec updated"
        );
        Ok(next)
    }

    /// Record an acceptance of the spec's current hash and freeze the spec
    /// once both sides have accepted it.
    #[instrument(skip(self, request), fields(spec_id = %id, actor_type = %request.actor_type))]
    pub async fn accept_evaluation_spec(
        &self,
        id: &SpecId,
        request: AcceptEvaluationSpec,
    ) -> ServiceResult<AcceptanceOutcome> {
        request.validate()?;
        let spec = self.get_evaluation_spec(id).await?;

        let now = Utc::now();
        let event = SpecAcceptanceEvent::new(&spec, request.actor_type, request.actor_id, now);
        let (event, newly_recorded) = self.storage.record_acceptance(event).await?;
        if newly_recorded {
            info!(event_id = %event.id, spec_hash = %event.spec_hash, "Spec acceptance recorded");
        }

        let spec = self.promote(spec).await?;
        Ok(AcceptanceOutcome {
            event,
            spec,
            newly_recorded,
        })
    }

    /// Freeze `spec` if its current hash is accepted by both sides. A
    /// concurrent writer bumping the revision sends us back to reload.
    async fn promote(&self, mut spec: EvaluationSpec) -> ServiceResult<EvaluationSpec> {
        for attempt in 1..=PROMOTE_ATTEMPTS {
            let acceptances = self.storage.list_acceptances(&spec.id).await?;
            let Some(frozen) = SpecLifecycle::promote_if_accepted(&spec, &acceptances, Utc::now())?
            else {
                return Ok(spec);
            };

            match self.storage.update_spec(frozen.clone(), spec.revision).await {
                Ok(()) => {
                    info!(spec_id = %frozen.id, hash = %frozen.hash, "Evaluation spec frozen");
                    return Ok(frozen);
                }
                Err(StorageError::Conflict(msg)) if attempt < PROMOTE_ATTEMPTS => {
                    warn!(spec_id = %spec.id, attempt, conflict = %msg, "Retrying spec freeze");
                    spec = self.get_evaluation_spec(&spec.id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ServiceError::Conflict(format!(
            "spec {} kept changing while freezing",
            spec.id
        )))
    }

    pub async fn list_spec_acceptances(
        &self,
        id: &SpecId,
    ) -> ServiceResult<Vec<SpecAcceptanceEvent>> {
        self.get_evaluation_spec(id).await?;
        Ok(self.storage.list_acceptances(id).await?)
    }

    // ------------------------------------------------------------------
    // Deliveries
    // ------------------------------------------------------------------

    #[instrument(skip(self, request), fields(spec_id = %request.spec_id))]
    pub async fn create_normalized_delivery(
        &self,
        request: CreateNormalizedDelivery,
    ) -> ServiceResult<NormalizedDelivery> {
        request.validate()?;
        let spec = self.get_evaluation_spec(&request.spec_id).await?;

        let delivery = self
            .normalizer
            .normalize(&spec, request.raw_payload, Utc::now())?;
        self.storage.insert_delivery(delivery.clone()).await?;

        info!(
            delivery_id = %delivery.id,
            deliverable_type = %delivery.deliverable_type,
            hash = %delivery.hash,
            "Delivery normalized"
        );
        Ok(delivery)
    }

    pub async fn get_normalized_delivery(&self, id: &DeliveryId) -> ServiceResult<NormalizedDelivery> {
        self.storage
            .get_delivery(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("delivery", id))
    }

    // ------------------------------------------------------------------
    // Evidence
    // ------------------------------------------------------------------

    #[instrument(skip(self, request), fields(spec_id = %request.spec_id, delivery_id = %request.delivery_id))]
    pub async fn create_evidence_bundle(
        &self,
        request: CreateEvidenceBundle,
    ) -> ServiceResult<EvidenceBundle> {
        request.validate()?;
        let spec = self.get_evaluation_spec(&request.spec_id).await?;
        let delivery = self.get_normalized_delivery(&request.delivery_id).await?;
        if delivery.spec_id != spec.id {
            warn!(target_spec = %delivery.spec_id, "Delivery does not target spec");
            return Err(ServiceError::validation(format!(
                "delivery {} targets spec {}, not {}",
                delivery.id, delivery.spec_id, spec.id
            )));
        }

        let bundle = EvidenceBundle::new(spec.id, delivery.id, Utc::now());
        self.storage.insert_bundle(bundle.clone()).await?;

        info!(bundle_id = %bundle.id, "Evidence bundle created");
        Ok(bundle)
    }

    pub async fn get_evidence_bundle(&self, id: &BundleId) -> ServiceResult<EvidenceBundle> {
        self.storage
            .get_bundle(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("bundle", id))
    }

    /// Append an item to an open bundle.
    #[instrument(skip(self, request), fields(bundle_id = %bundle_id))]
    pub async fn add_evidence_item(
        &self,
        bundle_id: &BundleId,
        request: NewEvidenceItem,
    ) -> ServiceResult<EvidenceItem> {
        request.validate()?;
        let bundle = self.get_evidence_bundle(bundle_id).await?;
        if bundle.is_sealed() {
            warn!("Evidence bundle already sealed");
            return Err(ServiceError::validation(format!(
                "bundle {bundle_id} is sealed and accepts no more items"
            )));
        }

        let item = EvidenceItem {
            id: request.id.unwrap_or_else(EvidenceItemId::generate),
            bundle_id: bundle.id,
            evidence_type: request.evidence_type,
            uri: request.uri,
            content_hash: request.content_hash,
            observed_at: request.observed_at,
            metadata: request.metadata,
            created_at: Utc::now(),
        };
        self.storage.append_item(item.clone()).await?;

        info!(item_id = %item.id, evidence_type = %item.evidence_type, "Evidence item added");
        Ok(item)
    }

    pub async fn list_evidence_items(&self, bundle_id: &BundleId) -> ServiceResult<Vec<EvidenceItem>> {
        self.get_evidence_bundle(bundle_id).await?;
        Ok(self.storage.list_items(bundle_id).await?)
    }

    // ------------------------------------------------------------------
    // Jobs and reports
    // ------------------------------------------------------------------

    /// Queue a job. The bundle is sealed from here on.
    #[instrument(skip(self, request), fields(spec_id = %request.spec_id, bundle_id = %request.bundle_id))]
    pub async fn create_verification_job(
        &self,
        request: CreateVerificationJob,
    ) -> ServiceResult<VerificationJob> {
        self.orchestrator.enqueue(request, Utc::now()).await
    }

    #[instrument(skip(self), fields(job_id = %id))]
    pub async fn run_verification_job(&self, id: &JobId) -> ServiceResult<JobOutcome> {
        self.orchestrator.run(id, Utc::now()).await
    }

    /// Queue and run in one call.
    pub async fn submit_verification_job(
        &self,
        request: CreateVerificationJob,
    ) -> ServiceResult<JobOutcome> {
        let job = self.create_verification_job(request).await?;
        self.run_verification_job(&job.id).await
    }

    pub async fn get_verification_job(&self, id: &JobId) -> ServiceResult<VerificationJob> {
        self.storage
            .get_job(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("job", id))
    }

    pub async fn get_verification_report(&self, id: &ReportId) -> ServiceResult<VerificationReport> {
        self.storage
            .get_report(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("report", id))
    }

    pub async fn get_report_for_job(&self, job_id: &JobId) -> ServiceResult<VerificationReport> {
        self.storage
            .get_report_for_job(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("report for job", job_id))
    }
}
