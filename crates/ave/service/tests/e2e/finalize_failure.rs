//! End-to-end test: the report is stored but the terminal job transition
//! fails. The job must not be left RUNNING.

use crate::support::*;
use async_trait::async_trait;
use ave_engine::TranslatorConfig;
use ave_service::VerificationService;
use ave_storage::{
    AcceptanceStore, DeliveryStore, EvidenceStore, InMemoryVerifyStorage, JobStore, ReportStore,
    SnapshotStore, SpecStore, StorageError, StorageLifecycle, StorageResult,
};
use ave_types::{
    AskSnapshot, BundleId, DeliveryId, EvaluationSpec, EvidenceBundle, EvidenceItem, JobId,
    JobStatus, JobTransition, NormalizedDelivery, ReportId, SnapshotId, SpecAcceptanceEvent,
    SpecId, VerificationJob, VerificationReport,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

/// In-memory backend whose RUNNING -> SUCCEEDED transition always errors.
#[derive(Default)]
struct LostFinalizeStorage {
    inner: InMemoryVerifyStorage,
}

#[async_trait]
impl SnapshotStore for LostFinalizeStorage {
    async fn insert_snapshot(&self, snapshot: AskSnapshot) -> StorageResult<()> {
        self.inner.insert_snapshot(snapshot).await
    }
    async fn get_snapshot(&self, id: &SnapshotId) -> StorageResult<Option<AskSnapshot>> {
        self.inner.get_snapshot(id).await
    }
}

#[async_trait]
impl SpecStore for LostFinalizeStorage {
    async fn insert_spec(&self, spec: EvaluationSpec) -> StorageResult<()> {
        self.inner.insert_spec(spec).await
    }
    async fn get_spec(&self, id: &SpecId) -> StorageResult<Option<EvaluationSpec>> {
        self.inner.get_spec(id).await
    }
    async fn update_spec(
        &self,
        spec: EvaluationSpec,
        expected_revision: u64,
    ) -> StorageResult<()> {
        self.inner.update_spec(spec, expected_revision).await
    }
}

#[async_trait]
impl AcceptanceStore for LostFinalizeStorage {
    async fn record_acceptance(
        &self,
        event: SpecAcceptanceEvent,
    ) -> StorageResult<(SpecAcceptanceEvent, bool)> {
        self.inner.record_acceptance(event).await
    }
    async fn list_acceptances(&self, spec_id: &SpecId) -> StorageResult<Vec<SpecAcceptanceEvent>> {
        self.inner.list_acceptances(spec_id).await
    }
}

#[async_trait]
impl DeliveryStore for LostFinalizeStorage {
    async fn insert_delivery(&self, delivery: NormalizedDelivery) -> StorageResult<()> {
        self.inner.insert_delivery(delivery).await
    }
    async fn get_delivery(&self, id: &DeliveryId) -> StorageResult<Option<NormalizedDelivery>> {
        self.inner.get_delivery(id).await
    }
}

#[async_trait]
impl EvidenceStore for LostFinalizeStorage {
    async fn insert_bundle(&self, bundle: EvidenceBundle) -> StorageResult<()> {
        self.inner.insert_bundle(bundle).await
    }
    async fn get_bundle(&self, id: &BundleId) -> StorageResult<Option<EvidenceBundle>> {
        self.inner.get_bundle(id).await
    }
    async fn append_item(&self, item: EvidenceItem) -> StorageResult<()> {
        self.inner.append_item(item).await
    }
    async fn list_items(&self, bundle_id: &BundleId) -> StorageResult<Vec<EvidenceItem>> {
        self.inner.list_items(bundle_id).await
    }
    async fn seal_bundle(
        &self,
        bundle_id: &BundleId,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        self.inner.seal_bundle(bundle_id, sealed_at).await
    }
}

#[async_trait]
impl JobStore for LostFinalizeStorage {
    async fn insert_job(&self, job: VerificationJob) -> StorageResult<()> {
        self.inner.insert_job(job).await
    }
    async fn enqueue_job(
        &self,
        job: VerificationJob,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        self.inner.enqueue_job(job, sealed_at).await
    }
    async fn get_job(&self, id: &JobId) -> StorageResult<Option<VerificationJob>> {
        self.inner.get_job(id).await
    }
    async fn transition_job(
        &self,
        id: &JobId,
        transition: JobTransition,
    ) -> StorageResult<VerificationJob> {
        if transition.to == JobStatus::Succeeded {
            return Err(StorageError::Backend("connection reset".to_string()));
        }
        self.inner.transition_job(id, transition).await
    }
}

#[async_trait]
impl ReportStore for LostFinalizeStorage {
    async fn insert_report(&self, report: VerificationReport) -> StorageResult<()> {
        self.inner.insert_report(report).await
    }
    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<VerificationReport>> {
        self.inner.get_report(id).await
    }
    async fn get_report_for_job(
        &self,
        job_id: &JobId,
    ) -> StorageResult<Option<VerificationReport>> {
        self.inner.get_report_for_job(job_id).await
    }
}

#[async_trait]
impl StorageLifecycle for LostFinalizeStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }
    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn failed_finalize_marks_job_failed() {
    let svc = VerificationService::new(
        Arc::new(LostFinalizeStorage::default()),
        TranslatorConfig::default(),
    );
    let spec = frozen_spec(&svc, "rank the top 3 vendors", json!({})).await;
    let (delivery, bundle) = deliver(&svc, &spec, vendor_table()).await;
    add_evidence(&svc, &bundle.id, "ev1", None).await;

    let outcome = svc
        .submit_verification_job(job_request(&spec, &delivery, &bundle))
        .await
        .unwrap();
    let report = outcome.report.expect("report persisted before finalize");

    assert_eq!(outcome.job.status, JobStatus::Failed);
    assert_eq!(outcome.job.report_id.as_ref(), Some(&report.id));
    let payload = outcome.job.error_payload.as_ref().expect("error payload");
    assert_eq!(payload["stage"], "finalize");
    assert_eq!(payload["code"], "INTERNAL_ERROR");

    let stored = svc.get_verification_job(&outcome.job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    let linked = svc.get_report_for_job(&outcome.job.id).await.unwrap();
    assert_eq!(linked.id, report.id);
}
