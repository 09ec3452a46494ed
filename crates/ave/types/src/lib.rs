//! AVE Types - Acceptance Verification Engine types
//!
//! Entities shared by the translator, normalizer, inspector, storage and
//! service layers, plus the canonical content hash every audited entity
//! carries. All cross-entity references are opaque ids; nothing here follows
//! a pointer into another service's storage.

#![deny(unsafe_code)]

pub mod delivery;
pub mod error;
pub mod evidence;
pub mod hash;
pub mod ids;
pub mod job;
pub mod report;
pub mod snapshot;
pub mod spec;

pub use delivery::{
    ClaimRef, DeliveryBody, MemoBody, MemoSource, NormalizedDelivery, RankedItem, RankedTableBody,
};
pub use error::TypesError;
pub use evidence::{EvidenceBundle, EvidenceItem, EvidenceType};
pub use hash::{canonical_json, ContentHash};
pub use ids::{
    AcceptanceEventId, BundleId, DeliveryId, EvidenceItemId, JobId, ReportId, SnapshotId, SpecId,
};
pub use job::{JobError, JobStatus, JobTransition, VerificationJob};
pub use report::{
    Decision, DimensionScores, FreshnessSummary, GateOutcomes, InspectionReport, ReportCounts,
    VerificationReport,
};
pub use snapshot::{AskSnapshot, OwnerRef};
pub use spec::{
    ActorType, DecisionPolicy, DeliverableType, EvaluationSpec, EvidencePolicy, ScoringWeights,
    SpecAcceptanceEvent, SpecBody, SpecStatus,
};
