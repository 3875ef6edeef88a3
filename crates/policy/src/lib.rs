//! Risk-exposure scoring and enforcement resolution: turns a classification
//! result plus the active `Settings` into an action on the request.

mod decision;
mod redact;
mod reu;

pub use decision::{resolve, PolicyAction, PolicyOutcome};
pub use redact::redact;
pub use reu::{compute_reu, DestinationTier, ExposureKind};
