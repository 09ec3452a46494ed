//! In-memory reference implementation of the AVE storage traits.
//!
//! Deterministic and test-friendly. Compare-and-set semantics match the
//! PostgreSQL adapter so the service behaves identically on both.

use crate::traits::{
    check_job_transition, AcceptanceStore, DeliveryStore, EvidenceStore, JobStore, ReportStore,
    SnapshotStore, SpecStore, StorageLifecycle,
};
use crate::{StorageError, StorageResult};
use ave_types::{
    AskSnapshot, BundleId, DeliveryId, EvaluationSpec, EvidenceBundle, EvidenceItem, JobId,
    JobTransition, NormalizedDelivery, ReportId, SnapshotId, SpecAcceptanceEvent, SpecId,
    VerificationJob, VerificationReport,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct EvidenceState {
    bundles: HashMap<BundleId, EvidenceBundle>,
    items: HashMap<BundleId, Vec<EvidenceItem>>,
}

#[derive(Default)]
struct ReportState {
    reports: HashMap<ReportId, VerificationReport>,
    by_job: HashMap<JobId, ReportId>,
}

/// In-memory AVE storage adapter.
#[derive(Default)]
pub struct InMemoryVerifyStorage {
    snapshots: RwLock<HashMap<SnapshotId, AskSnapshot>>,
    specs: RwLock<HashMap<SpecId, EvaluationSpec>>,
    acceptances: RwLock<HashMap<SpecId, Vec<SpecAcceptanceEvent>>>,
    deliveries: RwLock<HashMap<DeliveryId, NormalizedDelivery>>,
    evidence: RwLock<EvidenceState>,
    jobs: RwLock<HashMap<JobId, VerificationJob>>,
    reports: RwLock<ReportState>,
}

impl InMemoryVerifyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{what} lock poisoned"))
}

#[async_trait]
impl SnapshotStore for InMemoryVerifyStorage {
    async fn insert_snapshot(&self, snapshot: AskSnapshot) -> StorageResult<()> {
        let mut guard = self.snapshots.write().map_err(|_| poisoned("snapshots"))?;
        if guard.contains_key(&snapshot.id) {
            return Err(StorageError::Conflict(format!(
                "snapshot {} already exists",
                snapshot.id
            )));
        }
        guard.insert(snapshot.id.clone(), snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> StorageResult<Option<AskSnapshot>> {
        let guard = self.snapshots.read().map_err(|_| poisoned("snapshots"))?;
        Ok(guard.get(id).cloned())
    }
}

#[async_trait]
impl SpecStore for InMemoryVerifyStorage {
    async fn insert_spec(&self, spec: EvaluationSpec) -> StorageResult<()> {
        let mut guard = self.specs.write().map_err(|_| poisoned("specs"))?;
        if guard.contains_key(&spec.id) {
            return Err(StorageError::Conflict(format!(
                "spec {} already exists",
                spec.id
            )));
        }
        guard.insert(spec.id.clone(), spec);
        Ok(())
    }

    async fn get_spec(&self, id: &SpecId) -> StorageResult<Option<EvaluationSpec>> {
        let guard = self.specs.read().map_err(|_| poisoned("specs"))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_spec(
        &self,
        spec: EvaluationSpec,
        expected_revision: u64,
    ) -> StorageResult<()> {
        let mut guard = self.specs.write().map_err(|_| poisoned("specs"))?;
        let stored = guard
            .get_mut(&spec.id)
            .ok_or_else(|| StorageError::NotFound(format!("spec {} not found", spec.id)))?;

        if stored.revision != expected_revision {
            return Err(StorageError::Conflict(format!(
                "spec {} revision mismatch: expected {}, found {}",
                spec.id, expected_revision, stored.revision
            )));
        }

        *stored = spec;
        Ok(())
    }
}

#[async_trait]
impl AcceptanceStore for InMemoryVerifyStorage {
    async fn record_acceptance(
        &self,
        event: SpecAcceptanceEvent,
    ) -> StorageResult<(SpecAcceptanceEvent, bool)> {
        let mut guard = self
            .acceptances
            .write()
            .map_err(|_| poisoned("acceptances"))?;
        let events = guard.entry(event.spec_id.clone()).or_default();

        if let Some(existing) = events
            .iter()
            .find(|e| e.actor_type == event.actor_type && e.spec_hash == event.spec_hash)
        {
            return Ok((existing.clone(), false));
        }

        events.push(event.clone());
        Ok((event, true))
    }

    async fn list_acceptances(&self, spec_id: &SpecId) -> StorageResult<Vec<SpecAcceptanceEvent>> {
        let guard = self
            .acceptances
            .read()
            .map_err(|_| poisoned("acceptances"))?;
        Ok(guard.get(spec_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DeliveryStore for InMemoryVerifyStorage {
    async fn insert_delivery(&self, delivery: NormalizedDelivery) -> StorageResult<()> {
        let mut guard = self.deliveries.write().map_err(|_| poisoned("deliveries"))?;
        if guard.contains_key(&delivery.id) {
            return Err(StorageError::Conflict(format!(
                "delivery {} already exists",
                delivery.id
            )));
        }
        guard.insert(delivery.id.clone(), delivery);
        Ok(())
    }

    async fn get_delivery(&self, id: &DeliveryId) -> StorageResult<Option<NormalizedDelivery>> {
        let guard = self.deliveries.read().map_err(|_| poisoned("deliveries"))?;
        Ok(guard.get(id).cloned())
    }
}

#[async_trait]
impl EvidenceStore for InMemoryVerifyStorage {
    async fn insert_bundle(&self, bundle: EvidenceBundle) -> StorageResult<()> {
        let mut guard = self.evidence.write().map_err(|_| poisoned("evidence"))?;
        if guard.bundles.contains_key(&bundle.id) {
            return Err(StorageError::Conflict(format!(
                "bundle {} already exists",
                bundle.id
            )));
        }
        guard.items.insert(bundle.id.clone(), Vec::new());
        guard.bundles.insert(bundle.id.clone(), bundle);
        Ok(())
    }

    async fn get_bundle(&self, id: &BundleId) -> StorageResult<Option<EvidenceBundle>> {
        let guard = self.evidence.read().map_err(|_| poisoned("evidence"))?;
        Ok(guard.bundles.get(id).cloned())
    }

    async fn append_item(&self, item: EvidenceItem) -> StorageResult<()> {
        let mut guard = self.evidence.write().map_err(|_| poisoned("evidence"))?;
        let bundle = guard.bundles.get(&item.bundle_id).ok_or_else(|| {
            StorageError::NotFound(format!("bundle {} not found", item.bundle_id))
        })?;
        if bundle.is_sealed() {
            return Err(StorageError::InvariantViolation(format!(
                "bundle {} is sealed",
                item.bundle_id
            )));
        }

        let items = guard.items.entry(item.bundle_id.clone()).or_default();
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(StorageError::Conflict(format!(
                "evidence item {} already exists in bundle {}",
                item.id, item.bundle_id
            )));
        }
        items.push(item);
        Ok(())
    }

    async fn list_items(&self, bundle_id: &BundleId) -> StorageResult<Vec<EvidenceItem>> {
        let guard = self.evidence.read().map_err(|_| poisoned("evidence"))?;
        Ok(guard.items.get(bundle_id).cloned().unwrap_or_default())
    }

    async fn seal_bundle(
        &self,
        bundle_id: &BundleId,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        let mut guard = self.evidence.write().map_err(|_| poisoned("evidence"))?;
        let bundle = guard
            .bundles
            .get_mut(bundle_id)
            .ok_or_else(|| StorageError::NotFound(format!("bundle {bundle_id} not found")))?;
        if bundle.sealed_at.is_none() {
            bundle.sealed_at = Some(sealed_at);
        }
        Ok(bundle.clone())
    }
}

#[async_trait]
impl JobStore for InMemoryVerifyStorage {
    async fn insert_job(&self, job: VerificationJob) -> StorageResult<()> {
        let mut guard = self.jobs.write().map_err(|_| poisoned("jobs"))?;
        if guard.contains_key(&job.id) {
            return Err(StorageError::Conflict(format!(
                "job {} already exists",
                job.id
            )));
        }
        guard.insert(job.id.clone(), job);
        Ok(())
    }

    async fn enqueue_job(
        &self,
        job: VerificationJob,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        // Lock order: jobs, then evidence.
        let mut jobs = self.jobs.write().map_err(|_| poisoned("jobs"))?;
        if jobs.contains_key(&job.id) {
            return Err(StorageError::Conflict(format!(
                "job {} already exists",
                job.id
            )));
        }
        let mut evidence = self.evidence.write().map_err(|_| poisoned("evidence"))?;
        let bundle = evidence.bundles.get_mut(&job.bundle_id).ok_or_else(|| {
            StorageError::NotFound(format!("bundle {} not found", job.bundle_id))
        })?;
        if bundle.sealed_at.is_none() {
            bundle.sealed_at = Some(sealed_at);
        }
        let bundle = bundle.clone();
        jobs.insert(job.id.clone(), job);
        Ok(bundle)
    }

    async fn get_job(&self, id: &JobId) -> StorageResult<Option<VerificationJob>> {
        let guard = self.jobs.read().map_err(|_| poisoned("jobs"))?;
        Ok(guard.get(id).cloned())
    }

    async fn transition_job(
        &self,
        id: &JobId,
        transition: JobTransition,
    ) -> StorageResult<VerificationJob> {
        let mut guard = self.jobs.write().map_err(|_| poisoned("jobs"))?;
        let job = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("job {id} not found")))?;

        check_job_transition(job, &transition)?;
        transition.apply(job);
        Ok(job.clone())
    }
}

#[async_trait]
impl ReportStore for InMemoryVerifyStorage {
    async fn insert_report(&self, report: VerificationReport) -> StorageResult<()> {
        let mut guard = self.reports.write().map_err(|_| poisoned("reports"))?;
        if guard.reports.contains_key(&report.id) {
            return Err(StorageError::Conflict(format!(
                "report {} already exists",
                report.id
            )));
        }
        if let Some(existing) = guard.by_job.get(&report.job_id) {
            return Err(StorageError::Conflict(format!(
                "job {} already has report {existing}",
                report.job_id
            )));
        }
        guard.by_job.insert(report.job_id.clone(), report.id.clone());
        guard.reports.insert(report.id.clone(), report);
        Ok(())
    }

    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<VerificationReport>> {
        let guard = self.reports.read().map_err(|_| poisoned("reports"))?;
        Ok(guard.reports.get(id).cloned())
    }

    async fn get_report_for_job(
        &self,
        job_id: &JobId,
    ) -> StorageResult<Option<VerificationReport>> {
        let guard = self.reports.read().map_err(|_| poisoned("reports"))?;
        Ok(guard
            .by_job
            .get(job_id)
            .and_then(|id| guard.reports.get(id))
            .cloned())
    }
}

#[async_trait]
impl StorageLifecycle for InMemoryVerifyStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
