pub mod config;
pub mod error;
pub mod goals;
pub mod types;

pub use config::{AppConfig, RuleThresholds};
pub use error::{InsightsError, InsightsResult};
pub use goals::{CostConfig, UserGoals};
pub use types::{DateRange, Objective, RawAdRecord};
