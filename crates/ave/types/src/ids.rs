//! Opaque identifiers.
//!
//! Every entity kind gets its own newtype so a `SpecId` can never be passed
//! where a `JobId` is expected. The wire form is the bare string.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Fresh UUID v4 identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of an immutable ask snapshot.
    SnapshotId
);
opaque_id!(
    /// Identifier of an evaluation spec.
    SpecId
);
opaque_id!(
    /// Identifier of a recorded spec acceptance.
    AcceptanceEventId
);
opaque_id!(
    /// Identifier of a normalized delivery.
    DeliveryId
);
opaque_id!(
    /// Identifier of an evidence bundle.
    BundleId
);
opaque_id!(
    /// Identifier of a single evidence item. Deliveries cite these in
    /// `evidenceRefs` / `reference`, so callers usually choose them.
    EvidenceItemId
);
opaque_id!(
    /// Identifier of a verification job.
    JobId
);
opaque_id!(
    /// Identifier of a verification report.
    ReportId
);
