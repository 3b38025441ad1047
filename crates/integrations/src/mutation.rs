//! Write requests against ad sets and campaigns.

use insights_core::error::{InsightsError, InsightsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Active,
    Paused,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Active => "ACTIVE",
            DeliveryStatus::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub entity_id: String,
    pub status: DeliveryStatus,
}

impl StatusUpdate {
    pub fn new(entity_id: impl Into<String>, status: DeliveryStatus) -> InsightsResult<Self> {
        let entity_id = require_entity_id(entity_id.into())?;
        Ok(Self { entity_id, status })
    }

    pub(crate) fn form(&self) -> Vec<(String, String)> {
        vec![("status".to_string(), self.status.as_str().to_string())]
    }
}

/// Daily budget in the platform's minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetUpdate {
    pub entity_id: String,
    pub daily_budget_minor_units: u64,
}

impl BudgetUpdate {
    /// `round(major × 100)`; the result must be at least one minor unit.
    pub fn from_major(entity_id: impl Into<String>, daily_budget: f64) -> InsightsResult<Self> {
        let entity_id = require_entity_id(entity_id.into())?;
        if !daily_budget.is_finite() {
            return Err(InsightsError::validation("daily budget must be a finite number"));
        }
        let minor = (daily_budget * 100.0).round();
        if minor <= 0.0 {
            return Err(InsightsError::validation(format!(
                "daily budget must be positive, got {daily_budget}"
            )));
        }
        Ok(Self {
            entity_id,
            daily_budget_minor_units: minor as u64,
        })
    }

    pub(crate) fn form(&self) -> Vec<(String, String)> {
        vec![(
            "daily_budget".to_string(),
            self.daily_budget_minor_units.to_string(),
        )]
    }
}

/// Result of a write call as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub entity_id: String,
    pub success: bool,
}

fn require_entity_id(id: String) -> InsightsResult<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(InsightsError::validation(format!("invalid entity id '{id}'")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_rounds_to_minor_units() {
        assert_eq!(
            BudgetUpdate::from_major("123", 25.5).unwrap().daily_budget_minor_units,
            2550
        );
        assert_eq!(
            BudgetUpdate::from_major("123", 19.99).unwrap().daily_budget_minor_units,
            1999
        );
        assert_eq!(
            BudgetUpdate::from_major("123", 0.004).unwrap_err().to_string(),
            "Validation error: daily budget must be positive, got 0.004"
        );
        assert!(BudgetUpdate::from_major("123", -5.0).is_err());
        assert!(BudgetUpdate::from_major("123", f64::INFINITY).is_err());
    }

    #[test]
    fn entity_ids_are_checked() {
        assert!(StatusUpdate::new("", DeliveryStatus::Paused).is_err());
        assert!(StatusUpdate::new("12/../34", DeliveryStatus::Paused).is_err());
        let update = StatusUpdate::new(" 2385 ", DeliveryStatus::Active).unwrap();
        assert_eq!(update.entity_id, "2385");
        assert_eq!(update.form(), vec![("status".to_string(), "ACTIVE".to_string())]);
    }

    #[test]
    fn status_parses_from_wire_form() {
        let status: DeliveryStatus = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(status, DeliveryStatus::Paused);
    }
}
