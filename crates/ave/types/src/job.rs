use crate::ids::{BundleId, DeliveryId, JobId, ReportId, SpecId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Verification job lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    ReviewRequired,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::ReviewRequired => "REVIEW_REQUIRED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::ReviewRequired)
    }

    /// QUEUED -> RUNNING -> {SUCCEEDED, FAILED, REVIEW_REQUIRED}.
    /// A queued job may also fail before it starts.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::ReviewRequired)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure captured on a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub code: String,
    pub message: String,
    /// Orchestrator stage that failed (e.g. `load_inputs`, `persist_report`).
    pub stage: String,
}

impl JobError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        stage: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            stage: stage.into(),
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "stage": self.stage,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationJob {
    pub id: JobId,
    pub spec_id: SpecId,
    pub delivery_id: DeliveryId,
    pub bundle_id: BundleId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<ReportId>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationJob {
    pub fn queued(
        spec_id: SpecId,
        delivery_id: DeliveryId,
        bundle_id: BundleId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            spec_id,
            delivery_id,
            bundle_id,
            status: JobStatus::Queued,
            error_payload: None,
            report_id: None,
            revision: 1,
            created_at,
            updated_at: created_at,
        }
    }
}

/// A requested status change, applied by storage as compare-and-set.
#[derive(Clone, Debug, PartialEq)]
pub struct JobTransition {
    pub expected_status: JobStatus,
    pub expected_revision: u64,
    pub to: JobStatus,
    pub error_payload: Option<Value>,
    pub report_id: Option<ReportId>,
    pub at: DateTime<Utc>,
}

impl JobTransition {
    pub fn from_job(job: &VerificationJob, to: JobStatus, at: DateTime<Utc>) -> Self {
        Self {
            expected_status: job.status,
            expected_revision: job.revision,
            to,
            error_payload: None,
            report_id: None,
            at,
        }
    }

    pub fn with_error(mut self, error: &JobError) -> Self {
        self.error_payload = Some(error.to_payload());
        self
    }

    pub fn with_report(mut self, report_id: ReportId) -> Self {
        self.report_id = Some(report_id);
        self
    }

    /// Apply to a job already checked against the expectations.
    pub fn apply(&self, job: &mut VerificationJob) {
        job.status = self.to;
        if self.error_payload.is_some() {
            job.error_payload = self.error_payload.clone();
        }
        if self.report_id.is_some() {
            job.report_id = self.report_id.clone();
        }
        job.revision += 1;
        job.updated_at = self.at;
    }
}
