pub mod checker;
pub mod state;

pub use checker::HealthChecker;
pub use state::{Health, HealthEvent, HealthState, Transition};
