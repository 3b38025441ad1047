//! End-to-end dashboard assembly: aggregate, derive economics, classify,
//! rank, and run the insight backend.

use chrono::{DateTime, Utc};
use insights_core::config::AppConfig;
use insights_core::error::InsightsResult;
use insights_core::goals::{CostConfig, UserGoals};
use insights_core::types::{DateRange, RawAdRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::aliases::ActionAliasTable;
use crate::cost_model::{CostBreakdown, CostModel, RealizedSnapshot};
use crate::creatives::{rank_creatives, RankedCreative};
use crate::extractor::MetricsExtractor;
use crate::health::{BucketSummary, HealthBuckets, HealthClassifier, HealthTier};
use crate::hierarchy::{AccountOverview, CampaignNode, HierarchyAggregator};
use crate::history::HistoricalSeries;
use crate::rules::{AdSetSnapshot, AnalysisRequest, InsightBackend, InsightCard, RuleEngine};

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTotals {
    pub scale: BucketSummary,
    pub profit: BucketSummary,
    pub break_even: BucketSummary,
    pub loss: BucketSummary,
}

impl From<&HealthBuckets> for BucketTotals {
    fn from(buckets: &HealthBuckets) -> Self {
        Self {
            scale: buckets.summary(HealthTier::Scale),
            profit: buckets.summary(HealthTier::Profit),
            break_even: buckets.summary(HealthTier::BreakEven),
            loss: buckets.summary(HealthTier::Loss),
        }
    }
}

/// Everything the dashboard renders for one date range.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub alias_table_version: String,
    pub overview: AccountOverview,
    pub campaigns: Vec<CampaignNode>,
    pub cost_breakdown: CostBreakdown,
    pub health: HealthBuckets,
    pub bucket_totals: BucketTotals,
    pub top_creatives: Vec<RankedCreative>,
    pub insights: Vec<InsightCard>,
}

/// Stateless dashboard builder. Cheap to clone.
#[derive(Clone)]
pub struct InsightsPipeline {
    aggregator: HierarchyAggregator,
    cost_model: CostModel,
    classifier: HealthClassifier,
    backend: Arc<dyn InsightBackend>,
    top_creatives: usize,
}

impl Default for InsightsPipeline {
    fn default() -> Self {
        Self::new(
            ActionAliasTable::builtin(),
            CostConfig::default(),
            Arc::new(RuleEngine::default()),
            HealthClassifier::default(),
        )
    }
}

impl InsightsPipeline {
    pub fn new(
        aliases: ActionAliasTable,
        costs: CostConfig,
        backend: Arc<dyn InsightBackend>,
        classifier: HealthClassifier,
    ) -> Self {
        Self {
            aggregator: HierarchyAggregator::new(MetricsExtractor::new(aliases)),
            cost_model: CostModel::new(costs),
            classifier,
            backend,
            top_creatives: 10,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ActionAliasTable::builtin(),
            config.costs.clone(),
            Arc::new(RuleEngine::new(config.rules.clone())),
            HealthClassifier::new(config.rules.health_scale_multiplier),
        )
    }

    pub fn with_top_creatives(mut self, limit: usize) -> Self {
        self.top_creatives = limit;
        self
    }

    pub fn extractor(&self) -> &MetricsExtractor {
        self.aggregator.extractor()
    }

    pub fn aggregator(&self) -> &HierarchyAggregator {
        &self.aggregator
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    pub fn classifier(&self) -> &HealthClassifier {
        &self.classifier
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn build(
        &self,
        range: DateRange,
        records: &[RawAdRecord],
        goals: &UserGoals,
        history: &HistoricalSeries,
    ) -> InsightsResult<DashboardSnapshot> {
        let hierarchy = self.aggregator.aggregate(records);
        let overview = hierarchy.overview();

        let cost_breakdown = self
            .cost_model
            .derive(Some(&RealizedSnapshot::from(&overview.totals)));
        let health = self
            .classifier
            .classify(&hierarchy, &self.cost_model, &cost_breakdown);
        let bucket_totals = BucketTotals::from(&health);
        let top_creatives = rank_creatives(&hierarchy, &self.cost_model, Some(self.top_creatives));

        let adsets = AdSetSnapshot::from_hierarchy(&hierarchy);
        let insights = self.backend.analyze(goals, &adsets, history)?;

        info!(
            range = %range,
            campaigns = overview.campaigns,
            adsets = overview.adsets,
            insights = insights.len(),
            "Built dashboard snapshot"
        );

        Ok(DashboardSnapshot {
            range,
            generated_at: Utc::now(),
            alias_table_version: self.extractor().aliases().version.clone(),
            overview,
            campaigns: hierarchy.campaigns,
            cost_breakdown,
            health,
            bucket_totals,
            top_creatives,
            insights,
        })
    }

    /// Validate a client-supplied analysis request and run the backend.
    pub fn analyze(&self, request: AnalysisRequest) -> InsightsResult<Vec<InsightCard>> {
        let (goals, adsets, history) = request.into_parts()?;
        self.backend.analyze(&goals, &adsets, &history)
    }
}
