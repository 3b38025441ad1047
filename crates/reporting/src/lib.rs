//! Ad analytics core: metric extraction, hierarchy aggregation, unit
//! economics, health tiers and rule-based insights.

pub mod aliases;
pub mod cost_model;
pub mod creatives;
pub mod demographics;
pub mod extractor;
pub mod health;
pub mod hierarchy;
pub mod history;
pub mod pipeline;
pub mod ratio;
pub mod rules;

pub use aliases::{ActionAliasTable, CanonicalAction, ALIAS_TABLE_VERSION};
pub use cost_model::{CostBreakdown, CostModel, RealizedSnapshot, UnitEconomics};
pub use creatives::{rank_creatives, RankedCreative};
pub use demographics::{merge_breakdowns, BreakdownDimension, DemographicRow};
pub use extractor::{AdMetrics, MetricsExtractor};
pub use health::{HealthBuckets, HealthClassifier, HealthTier};
pub use hierarchy::{AccountOverview, Hierarchy, HierarchyAggregator};
pub use history::{DailyPoint, HistoricalSeries};
pub use pipeline::{DashboardSnapshot, InsightsPipeline};
pub use rules::{AdSetSnapshot, AnalysisRequest, InsightBackend, InsightCard, Priority, RuleEngine, RuleKind};
