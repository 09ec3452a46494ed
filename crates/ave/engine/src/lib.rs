//! AVE Engine - pure verification logic.
//!
//! - [`Translator`]: ask snapshot to DRAFT evaluation spec
//! - [`SpecLifecycle`]: bilateral acceptance and freezing
//! - [`Normalizer`]: raw payload to canonical delivery body
//! - [`Inspector`]: gates, scores and the final decision
//!
//! Nothing here performs I/O. Callers supply `now` and persist the results.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod inspector;
pub mod lifecycle;
pub mod normalizer;
pub mod translator;

pub use error::EngineError;
pub use inspector::{decide, Inspector};
pub use lifecycle::{SpecLifecycle, SpecUpdate};
pub use normalizer::Normalizer;
pub use translator::{TranslateRequest, Translator, TranslatorConfig};
