//! Creative ranking by realized profit.

use serde::Serialize;

use crate::cost_model::{CostModel, RealizedSnapshot, UnitEconomics};
use crate::hierarchy::{AdRow, Hierarchy};

#[derive(Debug, Clone, Serialize)]
pub struct RankedCreative {
    pub rank: usize,
    #[serde(flatten)]
    pub ad: AdRow,
    pub economics: UnitEconomics,
}

/// Ads of sales and lead campaigns with spend, best net profit first.
/// Ties keep hierarchy order.
pub fn rank_creatives(hierarchy: &Hierarchy, model: &CostModel, limit: Option<usize>) -> Vec<RankedCreative> {
    let mut ranked: Vec<(AdRow, UnitEconomics)> = hierarchy
        .adsets()
        .filter(|(campaign, _)| campaign.objective.is_revenue_bearing())
        .flat_map(|(_, adset)| adset.ads.iter())
        .filter(|ad| ad.metrics.spend > 0.0)
        .map(|ad| {
            let economics = model.realize(&RealizedSnapshot {
                revenue: ad.metrics.revenue,
                purchases: ad.metrics.purchases,
                spend: ad.metrics.spend,
            });
            (ad.clone(), economics)
        })
        .collect();

    ranked.sort_by(|(_, a), (_, b)| b.net_profit.total_cmp(&a.net_profit));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (ad, economics))| RankedCreative {
            rank: i + 1,
            ad,
            economics,
        })
        .collect()
}
