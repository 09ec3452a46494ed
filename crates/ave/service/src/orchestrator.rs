//! Verification job execution.
//!
//! A job runs through fixed stages. Anything that breaks after the job is
//! marked RUNNING is captured on the job as a structured error payload
//! instead of leaving it stuck.

use crate::dto::CreateVerificationJob;
use crate::error::{ServiceError, ServiceResult};
use ave_engine::Inspector;
use ave_storage::{DeliveryStore, EvidenceStore, JobStore, ReportStore, SpecStore, VerifyStorage};
use ave_types::{
    Decision, EvaluationSpec, EvidenceBundle, EvidenceItem, JobError, JobId, JobStatus,
    JobTransition, NormalizedDelivery, VerificationJob, VerificationReport,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Execution stages recorded in a failed job's error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadInputs,
    Inspect,
    PersistReport,
    Finalize,
}

impl RunStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::LoadInputs => "load_inputs",
            Self::Inspect => "inspect",
            Self::PersistReport => "persist_report",
            Self::Finalize => "finalize",
        }
    }
}

/// Job after a run, with the report when one was produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job: VerificationJob,
    pub report: Option<VerificationReport>,
}

/// Terminal job status for a verdict. Escalations need a human decision.
pub fn terminal_status(decision: Decision) -> JobStatus {
    match decision {
        Decision::Escalate => JobStatus::ReviewRequired,
        Decision::Accept | Decision::Reject => JobStatus::Succeeded,
    }
}

type JobInputs = (
    EvaluationSpec,
    NormalizedDelivery,
    EvidenceBundle,
    Vec<EvidenceItem>,
);

pub struct JobOrchestrator {
    storage: Arc<dyn VerifyStorage>,
    inspector: Inspector,
}

impl JobOrchestrator {
    pub fn new(storage: Arc<dyn VerifyStorage>) -> Self {
        Self {
            storage,
            inspector: Inspector,
        }
    }

    /// Validate references, seal the bundle and queue a job.
    pub async fn enqueue(
        &self,
        request: CreateVerificationJob,
        now: DateTime<Utc>,
    ) -> ServiceResult<VerificationJob> {
        request.validate()?;

        let spec = self
            .storage
            .get_spec(&request.spec_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("spec", &request.spec_id))?;
        let delivery = self
            .storage
            .get_delivery(&request.delivery_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("delivery", &request.delivery_id))?;
        let bundle = self
            .storage
            .get_bundle(&request.bundle_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("bundle", &request.bundle_id))?;

        if delivery.spec_id != spec.id {
            return Err(ServiceError::validation(format!(
                "delivery {} targets spec {}, not {}",
                delivery.id, delivery.spec_id, spec.id
            )));
        }
        if bundle.spec_id != spec.id || bundle.delivery_id != delivery.id {
            return Err(ServiceError::validation(format!(
                "bundle {} belongs to ({}, {}), not ({}, {})",
                bundle.id, bundle.spec_id, bundle.delivery_id, spec.id, delivery.id
            )));
        }

        let job = VerificationJob::queued(spec.id, delivery.id, bundle.id, now);
        self.storage.enqueue_job(job.clone(), now).await?;

        info!(
            job_id = %job.id,
            spec_id = %job.spec_id,
            delivery_id = %job.delivery_id,
            bundle_id = %job.bundle_id,
            "Verification job queued"
        );
        Ok(job)
    }

    /// Run a QUEUED job to a terminal status.
    pub async fn run(&self, job_id: &JobId, now: DateTime<Utc>) -> ServiceResult<JobOutcome> {
        let job = self
            .storage
            .get_job(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("job", job_id))?;

        if job.status != JobStatus::Queued {
            warn!(job_id = %job.id, status = %job.status, "Refusing to run job that is not queued");
            return Err(ServiceError::validation(format!(
                "job {} is {}, only QUEUED jobs can run",
                job.id, job.status
            )));
        }

        let running = self
            .storage
            .transition_job(
                &job.id,
                JobTransition::from_job(&job, JobStatus::Running, now),
            )
            .await?;
        info!(job_id = %running.id, "Verification job running");

        match self.execute(&running, now).await {
            Ok(report) => self.finish(running, report, now).await,
            Err((stage, err)) => self.fail(running, stage, err, now).await,
        }
    }

    async fn execute(
        &self,
        job: &VerificationJob,
        now: DateTime<Utc>,
    ) -> Result<VerificationReport, (RunStage, ServiceError)> {
        let (spec, delivery, bundle, items) = self
            .load_inputs(job)
            .await
            .map_err(|e| (RunStage::LoadInputs, e))?;

        let inspection = self.inspector.inspect(&spec, &delivery, &bundle, &items, now);
        let report = VerificationReport::from_inspection(job.id.clone(), inspection, now)
            .map_err(|e| (RunStage::Inspect, ServiceError::from(e)))?;

        self.storage
            .insert_report(report.clone())
            .await
            .map_err(|e| (RunStage::PersistReport, ServiceError::from(e)))?;

        Ok(report)
    }

    async fn load_inputs(
        &self,
        job: &VerificationJob,
    ) -> ServiceResult<JobInputs> {
        let spec = self
            .storage
            .get_spec(&job.spec_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("spec", &job.spec_id))?;
        let delivery = self
            .storage
            .get_delivery(&job.delivery_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("delivery", &job.delivery_id))?;
        let bundle = self
            .storage
            .get_bundle(&job.bundle_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("bundle", &job.bundle_id))?;
        let items = self.storage.list_items(&job.bundle_id).await?;
        Ok((spec, delivery, bundle, items))
    }

    async fn finish(
        &self,
        running: VerificationJob,
        report: VerificationReport,
        now: DateTime<Utc>,
    ) -> ServiceResult<JobOutcome> {
        let status = terminal_status(report.decision);
        let transition =
            JobTransition::from_job(&running, status, now).with_report(report.id.clone());

        let job = match self.storage.transition_job(&running.id, transition).await {
            Ok(job) => job,
            Err(err) => {
                let err = ServiceError::from(err);
                error!(
                    job_id = %running.id,
                    report_id = %report.id,
                    stage = RunStage::Finalize.name(),
                    error = %err,
                    "Report persisted but job could not be finalized"
                );
                return self.fail_unfinalized(running, report, err, now).await;
            }
        };

        info!(
            job_id = %job.id,
            report_id = %report.id,
            decision = %report.decision,
            score = report.score,
            gates_passed = report.gates_passed,
            status = %job.status,
            "Verification job finished"
        );
        Ok(JobOutcome {
            job,
            report: Some(report),
        })
    }

    /// The report is stored but the terminal transition did not land. If the
    /// job is still RUNNING, mark it FAILED at the finalize stage so it does
    /// not stay stuck; the report stays linked for inspection.
    async fn fail_unfinalized(
        &self,
        running: VerificationJob,
        report: VerificationReport,
        err: ServiceError,
        now: DateTime<Utc>,
    ) -> ServiceResult<JobOutcome> {
        let current = match self.storage.get_job(&running.id).await? {
            Some(job) if job.status == JobStatus::Running => job,
            _ => return Err(err),
        };

        let job_error = JobError::new(err.code(), err.to_string(), RunStage::Finalize.name());
        let transition = JobTransition::from_job(&current, JobStatus::Failed, now)
            .with_error(&job_error)
            .with_report(report.id.clone());
        let job = self.storage.transition_job(&current.id, transition).await?;
        warn!(job_id = %job.id, report_id = %report.id, "Unfinalized job marked failed");
        Ok(JobOutcome {
            job,
            report: Some(report),
        })
    }

    async fn fail(
        &self,
        running: VerificationJob,
        stage: RunStage,
        err: ServiceError,
        now: DateTime<Utc>,
    ) -> ServiceResult<JobOutcome> {
        error!(
            job_id = %running.id,
            spec_id = %running.spec_id,
            delivery_id = %running.delivery_id,
            bundle_id = %running.bundle_id,
            stage = stage.name(),
            code = err.code(),
            error = %err,
            "Verification job failed"
        );

        let job_error = JobError::new(err.code(), err.to_string(), stage.name());
        let transition =
            JobTransition::from_job(&running, JobStatus::Failed, now).with_error(&job_error);
        let job = self.storage.transition_job(&running.id, transition).await?;
        Ok(JobOutcome { job, report: None })
    }
}
