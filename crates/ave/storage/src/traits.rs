use crate::{StorageError, StorageResult};
use ave_types::{
    AskSnapshot, BundleId, DeliveryId, EvaluationSpec, EvidenceBundle, EvidenceItem, JobId,
    JobTransition, NormalizedDelivery, ReportId, SnapshotId, SpecAcceptanceEvent, SpecId,
    VerificationJob, VerificationReport,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Immutable ask snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn insert_snapshot(&self, snapshot: AskSnapshot) -> StorageResult<()>;
    async fn get_snapshot(&self, id: &SnapshotId) -> StorageResult<Option<AskSnapshot>>;
}

/// Evaluation specs, mutated only through revision-checked replacement.
#[async_trait]
pub trait SpecStore: Send + Sync {
    async fn insert_spec(&self, spec: EvaluationSpec) -> StorageResult<()>;

    async fn get_spec(&self, id: &SpecId) -> StorageResult<Option<EvaluationSpec>>;

    /// Replace the stored spec iff its revision still equals
    /// `expected_revision`. A stale expectation is a `Conflict`.
    async fn update_spec(&self, spec: EvaluationSpec, expected_revision: u64)
        -> StorageResult<()>;
}

/// Append-only acceptance log.
#[async_trait]
pub trait AcceptanceStore: Send + Sync {
    /// Idempotent per `(spec_id, actor_type, spec_hash)`. Returns the stored
    /// event and whether this call inserted it.
    async fn record_acceptance(
        &self,
        event: SpecAcceptanceEvent,
    ) -> StorageResult<(SpecAcceptanceEvent, bool)>;

    /// Events for one spec in the order they were recorded.
    async fn list_acceptances(&self, spec_id: &SpecId) -> StorageResult<Vec<SpecAcceptanceEvent>>;
}

/// Immutable normalized deliveries.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn insert_delivery(&self, delivery: NormalizedDelivery) -> StorageResult<()>;
    async fn get_delivery(&self, id: &DeliveryId) -> StorageResult<Option<NormalizedDelivery>>;
}

/// Evidence bundles and their items.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn insert_bundle(&self, bundle: EvidenceBundle) -> StorageResult<()>;

    async fn get_bundle(&self, id: &BundleId) -> StorageResult<Option<EvidenceBundle>>;

    /// Append to an open bundle. Duplicate item ids within the bundle are a
    /// `Conflict`; appending to a sealed bundle is an `InvariantViolation`.
    async fn append_item(&self, item: EvidenceItem) -> StorageResult<()>;

    /// Items in insertion order.
    async fn list_items(&self, bundle_id: &BundleId) -> StorageResult<Vec<EvidenceItem>>;

    /// Close the bundle for appends. Sealing twice keeps the first timestamp.
    async fn seal_bundle(
        &self,
        bundle_id: &BundleId,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle>;
}

/// Verification jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: VerificationJob) -> StorageResult<()>;

    /// Seal the job's bundle and insert the job in one step. If the insert
    /// fails the bundle keeps its prior seal state.
    async fn enqueue_job(
        &self,
        job: VerificationJob,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle>;

    async fn get_job(&self, id: &JobId) -> StorageResult<Option<VerificationJob>>;

    /// Compare-and-set status change. The stored job must match both the
    /// expected status and revision (`Conflict` otherwise) and the move must
    /// be a legal job transition (`InvariantViolation` otherwise).
    async fn transition_job(
        &self,
        id: &JobId,
        transition: JobTransition,
    ) -> StorageResult<VerificationJob>;
}

/// Immutable verification reports, at most one per job.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: VerificationReport) -> StorageResult<()>;
    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<VerificationReport>>;
    async fn get_report_for_job(&self, job_id: &JobId)
        -> StorageResult<Option<VerificationReport>>;
}

/// Explicit resource release at shutdown.
#[async_trait]
pub trait StorageLifecycle: Send + Sync {
    /// Backend label for logs (`memory`, `postgres`).
    fn backend(&self) -> &'static str;

    async fn close(&self) -> StorageResult<()>;
}

/// Unified storage bundle used by the verification service.
pub trait VerifyStorage:
    SnapshotStore
    + SpecStore
    + AcceptanceStore
    + DeliveryStore
    + EvidenceStore
    + JobStore
    + ReportStore
    + StorageLifecycle
    + Send
    + Sync
{
}

impl<T> VerifyStorage for T where
    T: SnapshotStore
        + SpecStore
        + AcceptanceStore
        + DeliveryStore
        + EvidenceStore
        + JobStore
        + ReportStore
        + StorageLifecycle
        + Send
        + Sync
{
}

/// Shared compare-and-set check for job transitions.
pub(crate) fn check_job_transition(
    job: &VerificationJob,
    transition: &JobTransition,
) -> StorageResult<()> {
    if job.status != transition.expected_status || job.revision != transition.expected_revision {
        return Err(StorageError::Conflict(format!(
            "job {} changed concurrently: expected {}@{}, found {}@{}",
            job.id, transition.expected_status, transition.expected_revision, job.status, job.revision
        )));
    }
    if !job.status.can_transition_to(transition.to) {
        return Err(StorageError::InvariantViolation(format!(
            "invalid job transition: {} -> {}",
            job.status, transition.to
        )));
    }
    Ok(())
}
