//! Financial-health tiers for sales and lead ad sets.

use insights_core::types::Objective;
use serde::Serialize;
use tracing::debug;

use crate::cost_model::{CostBreakdown, CostModel, RealizedSnapshot, UnitEconomics};
use crate::hierarchy::Hierarchy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    Loss,
    BreakEven,
    Profit,
    Scale,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedAdSet {
    pub campaign_name: String,
    pub campaign_objective: Objective,
    pub adset_id: String,
    pub adset_name: String,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub tier: HealthTier,
    #[serde(flatten)]
    pub economics: UnitEconomics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketSummary {
    pub count: usize,
    pub spend: f64,
    pub net_profit: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBuckets {
    pub scale: Vec<ClassifiedAdSet>,
    pub profit: Vec<ClassifiedAdSet>,
    pub break_even: Vec<ClassifiedAdSet>,
    pub loss: Vec<ClassifiedAdSet>,
    /// False when the cost model yields no valid breakeven/target ROAS; the
    /// buckets are then left empty rather than compared against nothing.
    pub thresholds_available: bool,
}

impl HealthBuckets {
    pub fn bucket(&self, tier: HealthTier) -> &[ClassifiedAdSet] {
        match tier {
            HealthTier::Scale => &self.scale,
            HealthTier::Profit => &self.profit,
            HealthTier::BreakEven => &self.break_even,
            HealthTier::Loss => &self.loss,
        }
    }

    pub fn summary(&self, tier: HealthTier) -> BucketSummary {
        let entries = self.bucket(tier);
        BucketSummary {
            count: entries.len(),
            spend: entries.iter().map(|e| e.spend).sum(),
            net_profit: entries.iter().map(|e| e.economics.net_profit).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.scale.len() + self.profit.len() + self.break_even.len() + self.loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, entry: ClassifiedAdSet) {
        match entry.tier {
            HealthTier::Scale => self.scale.push(entry),
            HealthTier::Profit => self.profit.push(entry),
            HealthTier::BreakEven => self.break_even.push(entry),
            HealthTier::Loss => self.loss.push(entry),
        }
    }
}

/// Buckets ad sets by realized ROAS against the cost model's thresholds.
#[derive(Debug, Clone)]
pub struct HealthClassifier {
    scale_multiplier: f64,
}

impl Default for HealthClassifier {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl HealthClassifier {
    pub fn new(scale_multiplier: f64) -> Self {
        Self { scale_multiplier }
    }

    /// Lower bounds are inclusive, so a value exactly on a boundary lands in
    /// the better tier.
    pub fn tier(&self, realized_roas: f64, breakeven_roas: f64, target_roas: f64) -> HealthTier {
        if realized_roas >= target_roas * self.scale_multiplier {
            HealthTier::Scale
        } else if realized_roas >= target_roas {
            HealthTier::Profit
        } else if realized_roas >= breakeven_roas {
            HealthTier::BreakEven
        } else {
            HealthTier::Loss
        }
    }

    pub fn classify(
        &self,
        hierarchy: &Hierarchy,
        model: &CostModel,
        breakdown: &CostBreakdown,
    ) -> HealthBuckets {
        let (Some(breakeven), Some(target)) = (breakdown.breakeven_roas, breakdown.target_roas)
        else {
            debug!("No valid ROAS thresholds, skipping health classification");
            return HealthBuckets::default();
        };

        let mut buckets = HealthBuckets {
            thresholds_available: true,
            ..Default::default()
        };

        for (campaign, adset) in hierarchy.adsets() {
            if !campaign.objective.is_revenue_bearing() || adset.totals.spend <= 0.0 {
                continue;
            }
            let economics = model.realize(&RealizedSnapshot::from(&adset.totals));
            buckets.push(ClassifiedAdSet {
                campaign_name: campaign.name.clone(),
                campaign_objective: campaign.objective.clone(),
                adset_id: adset.id.clone(),
                adset_name: adset.name.clone(),
                spend: adset.totals.spend,
                revenue: adset.totals.revenue,
                roas: adset.rates.roas,
                tier: self.tier(economics.realized_roas, breakeven, target),
                economics,
            });
        }

        buckets
    }
}
