//! User-entered performance goals and business unit economics.

use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, InsightsResult};

/// Performance goals the rule engine compares ad sets against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGoals {
    #[serde(default = "default_roas_goal", alias = "roas_goal")]
    pub roas_goal: f64,
    #[serde(default = "default_cpa_goal", alias = "cpa_goal")]
    pub cpa_goal: f64,
}

fn default_roas_goal() -> f64 {
    6.0
}
fn default_cpa_goal() -> f64 {
    30.0
}

impl Default for UserGoals {
    fn default() -> Self {
        Self {
            roas_goal: default_roas_goal(),
            cpa_goal: default_cpa_goal(),
        }
    }
}

impl UserGoals {
    pub fn validate(&self) -> InsightsResult<()> {
        require_positive("roasGoal", self.roas_goal)?;
        require_positive("cpaGoal", self.cpa_goal)
    }
}

/// Business cost parameters used to derive breakeven and target ROAS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostConfig {
    #[serde(default = "default_avg_price", alias = "avg_price")]
    pub avg_price: f64,
    #[serde(default = "default_direct_unit_cost", alias = "direct_unit_cost")]
    pub direct_unit_cost: f64,
    #[serde(default = "default_variable_unit_cost", alias = "variable_unit_cost")]
    pub variable_unit_cost: f64,
    #[serde(default = "default_fixed_costs_per_month", alias = "fixed_costs_per_month")]
    pub fixed_costs_per_month: f64,
    #[serde(default = "default_monthly_sales_target", alias = "monthly_sales_target")]
    pub monthly_sales_target: u32,
    #[serde(default = "default_target_profit_per_unit", alias = "target_profit_per_unit")]
    pub target_profit_per_unit: f64,
}

fn default_avg_price() -> f64 {
    35.00
}
fn default_direct_unit_cost() -> f64 {
    17.73
}
fn default_variable_unit_cost() -> f64 {
    2.40
}
fn default_fixed_costs_per_month() -> f64 {
    13_330.00
}
fn default_monthly_sales_target() -> u32 {
    1500
}
fn default_target_profit_per_unit() -> f64 {
    5.00
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            avg_price: default_avg_price(),
            direct_unit_cost: default_direct_unit_cost(),
            variable_unit_cost: default_variable_unit_cost(),
            fixed_costs_per_month: default_fixed_costs_per_month(),
            monthly_sales_target: default_monthly_sales_target(),
            target_profit_per_unit: default_target_profit_per_unit(),
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> InsightsResult<()> {
        require_non_negative("avgPrice", self.avg_price)?;
        require_non_negative("directUnitCost", self.direct_unit_cost)?;
        require_non_negative("variableUnitCost", self.variable_unit_cost)?;
        require_non_negative("fixedCostsPerMonth", self.fixed_costs_per_month)?;
        require_non_negative("targetProfitPerUnit", self.target_profit_per_unit)?;
        if self.monthly_sales_target == 0 {
            return Err(InsightsError::validation(
                "monthlySalesTarget must be at least 1",
            ));
        }
        Ok(())
    }

    /// Fixed monthly costs amortised over the monthly sales target.
    pub fn fixed_cost_per_unit(&self) -> f64 {
        self.fixed_costs_per_month / f64::from(self.monthly_sales_target.max(1))
    }

    pub fn total_unit_cost(&self) -> f64 {
        self.direct_unit_cost + self.variable_unit_cost + self.fixed_cost_per_unit()
    }
}

pub(crate) fn require_positive(field: &str, value: f64) -> InsightsResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(InsightsError::validation(format!(
            "{field} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &str, value: f64) -> InsightsResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(InsightsError::validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}
