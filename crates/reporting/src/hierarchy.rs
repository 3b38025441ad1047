//! Campaign → ad set → ad hierarchy with level-correct aggregation.
//!
//! Additive quantities are summed, reach takes the maximum over children
//! (unique users overlap), and every rate is recomputed from the level's own
//! totals. Per-child rates are never averaged.

use insights_core::types::{AdSetRef, CampaignRef, Objective, RawAdRecord};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::extractor::{AdMetrics, MetricsExtractor};
use crate::ratio::{percent, ratio};

// ---------------------------------------------------------------------------
// Totals and rates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub spend: f64,
    pub purchases: f64,
    pub revenue: f64,
    pub conversations: f64,
    pub clicks: f64,
    pub link_clicks: f64,
    pub impressions: f64,
    /// Largest reach among children, never their sum.
    pub reach: f64,
    pub video_plays: f64,
    pub video_completions: f64,
}

impl Totals {
    pub fn from_ad(metrics: &AdMetrics) -> Self {
        Self {
            spend: metrics.spend,
            purchases: metrics.purchases,
            revenue: metrics.revenue,
            conversations: metrics.conversations,
            clicks: metrics.clicks,
            link_clicks: metrics.link_clicks,
            impressions: metrics.impressions,
            reach: metrics.reach,
            video_plays: metrics.video_plays,
            video_completions: metrics.video_completions,
        }
    }

    pub fn absorb(&mut self, child: &Totals) {
        self.spend += child.spend;
        self.purchases += child.purchases;
        self.revenue += child.revenue;
        self.conversations += child.conversations;
        self.clicks += child.clicks;
        self.link_clicks += child.link_clicks;
        self.impressions += child.impressions;
        self.reach = self.reach.max(child.reach);
        self.video_plays += child.video_plays;
        self.video_completions += child.video_completions;
    }

    pub fn rates(&self) -> Rates {
        Rates {
            frequency: ratio(self.impressions, self.reach),
            ctr: percent(self.clicks, self.impressions),
            link_ctr: percent(self.link_clicks, self.impressions),
            roas: ratio(self.revenue, self.spend),
            cpa: ratio(self.spend, self.purchases),
            cost_per_conversation: ratio(self.spend, self.conversations),
            cpc: ratio(self.spend, self.clicks),
            cpm: ratio(self.spend, self.impressions) * 1000.0,
            video_completion_pct: percent(self.video_completions, self.video_plays),
        }
    }
}

/// Ratios derived from one level's totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub frequency: f64,
    pub ctr: f64,
    pub link_ctr: f64,
    pub roas: f64,
    pub cpa: f64,
    pub cost_per_conversation: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub video_completion_pct: f64,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AdRow {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub effective_status: Option<String>,
    pub campaign_name: String,
    pub adset_name: String,
    pub adset_id: String,
    pub thumbnail_url: Option<String>,
    pub permalink_url: Option<String>,
    #[serde(flatten)]
    pub metrics: AdMetrics,
    pub roas: f64,
    pub cpa: f64,
    pub cost_per_conversation: f64,
}

impl AdRow {
    fn new(record: &RawAdRecord, campaign: &CampaignRef, adset: &AdSetRef, metrics: AdMetrics) -> Self {
        let creative = record.creative.as_ref();
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            status: record.status.clone(),
            effective_status: record.effective_status.clone(),
            campaign_name: campaign.name.clone(),
            adset_name: adset.name.clone(),
            adset_id: adset.id.clone(),
            thumbnail_url: creative.and_then(|c| c.preview_url()).map(str::to_string),
            permalink_url: creative.and_then(|c| c.permalink_url.clone()),
            roas: ratio(metrics.revenue, metrics.spend),
            cpa: ratio(metrics.spend, metrics.purchases),
            cost_per_conversation: ratio(metrics.spend, metrics.conversations),
            metrics,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdSetNode {
    pub id: String,
    pub name: String,
    pub status: Option<String>,
    pub effective_status: Option<String>,
    /// Major currency units.
    pub daily_budget: f64,
    pub optimization_goal: Option<String>,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(flatten)]
    pub rates: Rates,
    pub ads: Vec<AdRow>,
}

impl AdSetNode {
    fn seed(adset: &AdSetRef) -> Self {
        Self {
            id: adset.id.clone(),
            name: adset.name.clone(),
            status: adset.status.clone(),
            effective_status: adset.effective_status.clone(),
            daily_budget: adset.daily_budget_major(),
            optimization_goal: adset.optimization_goal.clone(),
            totals: Totals::default(),
            rates: Rates::default(),
            ads: Vec::new(),
        }
    }

    fn roll_up(&mut self) {
        let mut totals = Totals::default();
        for ad in &self.ads {
            totals.absorb(&Totals::from_ad(&ad.metrics));
        }
        self.totals = totals;
        self.rates = totals.rates();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignNode {
    pub id: String,
    pub name: String,
    pub objective: Objective,
    pub status: Option<String>,
    pub effective_status: Option<String>,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(flatten)]
    pub rates: Rates,
    /// Ordered by first appearance in the input.
    pub adsets: Vec<AdSetNode>,
}

impl CampaignNode {
    fn seed(campaign: &CampaignRef) -> Self {
        Self {
            id: campaign.id.clone(),
            name: campaign.name.clone(),
            objective: campaign.objective.clone(),
            status: campaign.status.clone(),
            effective_status: campaign.effective_status.clone(),
            totals: Totals::default(),
            rates: Rates::default(),
            adsets: Vec::new(),
        }
    }

    fn roll_up(&mut self) {
        let mut totals = Totals::default();
        for adset in &mut self.adsets {
            adset.roll_up();
            totals.absorb(&adset.totals);
        }
        self.totals = totals;
        self.rates = totals.rates();
    }

    pub fn adset(&self, name: &str) -> Option<&AdSetNode> {
        self.adsets.iter().find(|a| a.name == name)
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct Hierarchy {
    pub campaigns: Vec<CampaignNode>,
    /// Records dropped for lacking a campaign, ad set or insights.
    pub skipped_records: usize,
}

impl Hierarchy {
    pub fn campaign(&self, name: &str) -> Option<&CampaignNode> {
        self.campaigns.iter().find(|c| c.name == name)
    }

    pub fn adsets(&self) -> impl Iterator<Item = (&CampaignNode, &AdSetNode)> {
        self.campaigns
            .iter()
            .flat_map(|c| c.adsets.iter().map(move |a| (c, a)))
    }

    /// Account-wide totals, rolled up from campaigns with the same rules.
    pub fn overview(&self) -> AccountOverview {
        let mut totals = Totals::default();
        for campaign in &self.campaigns {
            totals.absorb(&campaign.totals);
        }
        AccountOverview {
            campaigns: self.campaigns.len(),
            adsets: self.campaigns.iter().map(|c| c.adsets.len()).sum(),
            ads: self
                .adsets()
                .map(|(_, adset)| adset.ads.len())
                .sum(),
            skipped_records: self.skipped_records,
            totals,
            rates: totals.rates(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccountOverview {
    pub campaigns: usize,
    pub adsets: usize,
    pub ads: usize,
    pub skipped_records: usize,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(flatten)]
    pub rates: Rates,
}

/// Folds flat ad records into the campaign hierarchy.
#[derive(Debug, Clone, Default)]
pub struct HierarchyAggregator {
    extractor: MetricsExtractor,
}

impl HierarchyAggregator {
    pub fn new(extractor: MetricsExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &MetricsExtractor {
        &self.extractor
    }

    /// Group by campaign name, then ad set name, keeping first-seen order.
    pub fn aggregate(&self, records: &[RawAdRecord]) -> Hierarchy {
        let mut campaigns: Vec<CampaignNode> = Vec::new();
        let mut campaign_index: HashMap<String, usize> = HashMap::new();
        let mut adset_index: HashMap<(usize, String), usize> = HashMap::new();
        let mut skipped_records = 0usize;

        for record in records {
            let (Some(campaign), Some(adset), Some(insight)) =
                (record.campaign.as_ref(), record.adset.as_ref(), record.insight())
            else {
                skipped_records += 1;
                debug!(ad_id = %record.id, "Skipping ad without campaign, ad set or insights");
                continue;
            };

            let ci = *campaign_index
                .entry(campaign.name.clone())
                .or_insert_with(|| {
                    campaigns.push(CampaignNode::seed(campaign));
                    campaigns.len() - 1
                });
            let node = &mut campaigns[ci];
            let ai = *adset_index
                .entry((ci, adset.name.clone()))
                .or_insert_with(|| {
                    node.adsets.push(AdSetNode::seed(adset));
                    node.adsets.len() - 1
                });

            let metrics = self.extractor.extract(insight);
            node.adsets[ai]
                .ads
                .push(AdRow::new(record, campaign, adset, metrics));
        }

        for campaign in &mut campaigns {
            campaign.roll_up();
        }

        if skipped_records > 0 {
            metrics::counter!("aggregation.records_skipped").increment(skipped_records as u64);
        }
        debug!(
            campaigns = campaigns.len(),
            skipped = skipped_records,
            "Aggregated ad records"
        );

        Hierarchy {
            campaigns,
            skipped_records,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ad(campaign: &str, adset: &str, insights: serde_json::Value) -> RawAdRecord {
        serde_json::from_value(json!({
            "id": format!("{campaign}-{adset}-{}", insights["impressions"]),
            "name": "ad",
            "campaign": {"id": format!("id-{campaign}"), "name": campaign, "objective": "OUTCOME_SALES"},
            "adset": {"id": format!("id-{adset}"), "name": adset, "daily_budget": "2500"},
            "insights": {"data": [insights]}
        }))
        .unwrap()
    }

    #[test]
    fn parent_ctr_is_ratio_of_sums_not_average() {
        let records = vec![
            ad("C", "S", json!({"impressions": "100", "clicks": "10", "ctr": "10.0", "spend": "5"})),
            ad("C", "S", json!({"impressions": "900", "clicks": "18", "ctr": "2.0", "spend": "5"})),
        ];
        let hierarchy = HierarchyAggregator::default().aggregate(&records);
        let adset = hierarchy.campaigns[0].adset("S").unwrap();

        let average_of_children = (10.0 + 2.0) / 2.0;
        assert!((adset.rates.ctr - 2.8).abs() < 1e-9);
        assert!((adset.rates.ctr - average_of_children).abs() > 1.0);
        assert!((hierarchy.campaigns[0].rates.ctr - 2.8).abs() < 1e-9);
    }

    #[test]
    fn reach_is_max_of_children_at_every_level() {
        let records = vec![
            ad("C", "A", json!({"impressions": "3000", "reach": "1000", "spend": "10"})),
            ad("C", "A", json!({"impressions": "2000", "reach": "1500", "spend": "10"})),
            ad("C", "B", json!({"impressions": "1000", "reach": "800", "spend": "10"})),
        ];
        let hierarchy = HierarchyAggregator::default().aggregate(&records);
        let campaign = &hierarchy.campaigns[0];

        assert_eq!(campaign.adset("A").unwrap().totals.reach, 1500.0);
        assert_eq!(campaign.adset("B").unwrap().totals.reach, 800.0);
        assert_eq!(campaign.totals.reach, 1500.0);
        // frequency = impressions / reach, recomputed
        assert!((campaign.adset("A").unwrap().rates.frequency - 5000.0 / 1500.0).abs() < 1e-9);
        assert!((campaign.rates.frequency - 6000.0 / 1500.0).abs() < 1e-9);
    }

    #[test]
    fn zero_spend_levels_have_zero_ratios() {
        let records = vec![ad("C", "S", json!({"impressions": "0", "spend": "0"}))];
        let hierarchy = HierarchyAggregator::default().aggregate(&records);
        for rates in [hierarchy.campaigns[0].rates, hierarchy.campaigns[0].adsets[0].rates] {
            assert_eq!(rates.roas, 0.0);
            assert_eq!(rates.cpa, 0.0);
            assert_eq!(rates.ctr, 0.0);
            assert_eq!(rates.frequency, 0.0);
            assert_eq!(rates.cost_per_conversation, 0.0);
            assert!(!rates.cpm.is_nan());
        }
    }

    #[test]
    fn additive_totals_and_rates_roll_up() {
        let records = vec![
            ad("C", "A", json!({
                "impressions": "1000", "clicks": "20", "spend": "100",
                "actions": [{"action_type": "purchase", "value": "4"}],
                "action_values": [{"action_type": "purchase", "value": "400"}]
            })),
            ad("C", "B", json!({
                "impressions": "1000", "clicks": "30", "spend": "300",
                "actions": [{"action_type": "purchase", "value": "6"}],
                "action_values": [{"action_type": "purchase", "value": "300"}]
            })),
        ];
        let hierarchy = HierarchyAggregator::default().aggregate(&records);
        let campaign = &hierarchy.campaigns[0];

        assert_eq!(campaign.totals.spend, 400.0);
        assert_eq!(campaign.totals.purchases, 10.0);
        assert!((campaign.rates.roas - 700.0 / 400.0).abs() < 1e-9);
        assert!((campaign.rates.cpa - 40.0).abs() < 1e-9);
        assert!((campaign.rates.cpc - 8.0).abs() < 1e-9);
        assert!((campaign.rates.cpm - 200.0).abs() < 1e-9);
        assert!((campaign.adsets[0].daily_budget - 25.0).abs() < 1e-9);
    }

    #[test]
    fn records_without_campaign_or_insights_are_skipped() {
        let mut orphan = ad("C", "S", json!({"spend": "50"}));
        orphan.campaign = None;
        let mut no_insights = ad("C", "S", json!({"spend": "50"}));
        no_insights.insights = None;
        let kept = ad("C", "S", json!({"spend": "10"}));

        let hierarchy = HierarchyAggregator::default().aggregate(&[orphan, no_insights, kept]);
        assert_eq!(hierarchy.skipped_records, 2);
        assert_eq!(hierarchy.campaigns[0].totals.spend, 10.0);
        assert_eq!(hierarchy.overview().ads, 1);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let records = vec![
            ad("Zeta", "z1", json!({"spend": "1"})),
            ad("Alpha", "a1", json!({"spend": "1"})),
            ad("Zeta", "z0", json!({"spend": "1"})),
            ad("Alpha", "a1", json!({"spend": "1"})),
        ];
        let hierarchy = HierarchyAggregator::default().aggregate(&records);
        let names: Vec<_> = hierarchy.campaigns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha"]);
        let zeta: Vec<_> = hierarchy.campaigns[0].adsets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(zeta, ["z1", "z0"]);
        assert_eq!(hierarchy.campaigns[1].adsets[0].ads.len(), 2);
    }

    #[test]
    fn overview_rolls_up_campaigns() {
        let records = vec![
            ad("A", "x", json!({"spend": "50", "clicks": "5", "impressions": "500", "reach": "400"})),
            ad("B", "y", json!({"spend": "150", "clicks": "15", "impressions": "500", "reach": "450"})),
        ];
        let overview = HierarchyAggregator::default().aggregate(&records).overview();
        assert_eq!(overview.campaigns, 2);
        assert_eq!(overview.totals.spend, 200.0);
        assert_eq!(overview.totals.reach, 450.0);
        assert!((overview.rates.ctr - 2.0).abs() < 1e-9);
        assert!((overview.rates.cpc - 10.0).abs() < 1e-9);
    }
}
