pub mod anomaly;
pub mod counters;
pub mod trend;

pub use anomaly::{AnomalyDetector, AnomalyKind, AnomalyRecord};
pub use counters::{StatSnapshot, StatsRegistry};
pub use trend::{TrafficTrend, TrendSample};
