//! AVE Service - the verification engine wired to storage.
//!
//! [`VerificationService`] exposes every operation (snapshots, specs,
//! acceptance, deliveries, evidence, jobs and reports) over an injected
//! [`ave_storage::VerifyStorage`]. [`JobOrchestrator`] drives a verification
//! job from QUEUED to its terminal status.
//!
//! ```no_run
//! use ave_service::{init_tracing, AveConfig, VerificationService};
//!
//! # async fn boot() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AveConfig::load(Some("ave.toml"))?;
//! init_tracing(&config.logging)?;
//! let service = VerificationService::from_config(&config).await?;
//! // ...
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dto;
mod error;
pub mod orchestrator;
mod service;
pub mod telemetry;

pub use config::{AveConfig, LoggingConfig};
pub use dto::{
    AcceptEvaluationSpec, AcceptanceOutcome, CreateAskSnapshot, CreateEvaluationSpec,
    CreateEvidenceBundle, CreateNormalizedDelivery, CreateVerificationJob, NewEvidenceItem,
    UpdateEvaluationSpec,
};
pub use error::{ServiceError, ServiceResult};
pub use orchestrator::{JobOrchestrator, JobOutcome, RunStage};
pub use service::VerificationService;
pub use telemetry::init_tracing;
