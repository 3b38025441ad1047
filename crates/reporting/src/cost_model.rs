//! Unit economics: breakeven / target ROAS and realized profit.

use insights_core::goals::CostConfig;
use serde::{Deserialize, Serialize};

use crate::hierarchy::Totals;
use crate::ratio::{percent, ratio};

/// Realized revenue, purchases and spend for some scope (account, ad set, ad).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedSnapshot {
    pub revenue: f64,
    pub purchases: f64,
    pub spend: f64,
}

impl From<&Totals> for RealizedSnapshot {
    fn from(totals: &Totals) -> Self {
        Self {
            revenue: totals.revenue,
            purchases: totals.purchases,
            spend: totals.spend,
        }
    }
}

/// Profit realized by one scope under the configured unit costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnitEconomics {
    pub quantity_sold: f64,
    pub ticket_price: f64,
    pub unit_profit: f64,
    pub net_profit: f64,
    /// Net profit per unit of spend.
    pub realized_roas: f64,
}

/// Full cost-model output. `None` thresholds mean "no valid threshold":
/// the price does not cover unit costs (plus target profit).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub fixed_cost_per_unit: f64,
    pub total_unit_cost: f64,
    pub ticket_price: f64,
    pub quantity_sold: f64,
    pub breakeven_roas: Option<f64>,
    pub target_roas: Option<f64>,
    pub realized_unit_profit: f64,
    pub realized_net_profit: f64,
    pub realized_roas: f64,
    pub net_margin_pct: f64,
    pub roi_pct: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostModel {
    config: CostConfig,
}

impl CostModel {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    /// Purchases are authoritative; revenue / configured price is only the
    /// fallback when no purchase was counted.
    pub fn quantity_sold(&self, realized: &RealizedSnapshot) -> f64 {
        if realized.purchases > 0.0 {
            realized.purchases
        } else {
            ratio(realized.revenue, self.config.avg_price)
        }
    }

    pub fn realize(&self, realized: &RealizedSnapshot) -> UnitEconomics {
        let quantity_sold = self.quantity_sold(realized);
        let ticket_price = if quantity_sold > 0.0 {
            realized.revenue / quantity_sold
        } else {
            self.config.avg_price
        };
        let unit_profit = ticket_price - self.config.total_unit_cost();
        let net_profit = unit_profit * quantity_sold;

        UnitEconomics {
            quantity_sold,
            ticket_price,
            unit_profit,
            net_profit,
            realized_roas: ratio(net_profit, realized.spend),
        }
    }

    /// Thresholds and realized profit. Without a snapshot the configured
    /// average price stands in for the realized ticket.
    pub fn derive(&self, realized: Option<&RealizedSnapshot>) -> CostBreakdown {
        let snapshot = realized.copied().unwrap_or_default();
        let economics = self.realize(&snapshot);
        let total_unit_cost = self.config.total_unit_cost();
        let ticket = economics.ticket_price;

        CostBreakdown {
            fixed_cost_per_unit: self.config.fixed_cost_per_unit(),
            total_unit_cost,
            ticket_price: ticket,
            quantity_sold: economics.quantity_sold,
            breakeven_roas: roas_threshold(ticket, total_unit_cost),
            target_roas: roas_threshold(
                ticket,
                total_unit_cost + self.config.target_profit_per_unit,
            ),
            realized_unit_profit: economics.unit_profit,
            realized_net_profit: economics.net_profit,
            realized_roas: economics.realized_roas,
            net_margin_pct: percent(economics.net_profit, snapshot.revenue),
            roi_pct: percent(economics.net_profit, snapshot.spend),
        }
    }
}

/// `price / (price - cost)`, undefined when either the price or the margin
/// is not strictly positive.
fn roas_threshold(price: f64, cost: f64) -> Option<f64> {
    if price.is_nan() || price <= 0.0 {
        return None;
    }
    let margin = price - cost;
    if margin > 0.0 {
        Some(price / margin).filter(|v| v.is_finite())
    } else {
        None
    }
}
