pub mod admission;
pub mod rate_limit;

pub use admission::{AdmissionControl, AdmissionDecision};
