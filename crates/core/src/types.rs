//! Raw ads-platform payload types as returned by the Marketing Graph API,
//! plus small shared value types (date ranges, objectives).
//!
//! The Graph API encodes most numbers as strings and omits fields freely, so
//! every read goes through [`numeric`] which never fails.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{InsightsError, InsightsResult};

/// Lenient numeric read: JSON numbers and numeric strings are accepted,
/// anything else (absent, null, garbage, non-finite) reads as 0.
pub fn numeric(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// One ad returned by the ads endpoint for a date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAdRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub effective_status: Option<String>,
    #[serde(default)]
    pub campaign: Option<CampaignRef>,
    #[serde(default)]
    pub adset: Option<AdSetRef>,
    #[serde(default, alias = "ad_creative")]
    pub creative: Option<CreativeRef>,
    #[serde(default)]
    pub insights: Option<InsightsEnvelope>,
}

impl RawAdRecord {
    /// The single insights snapshot for the requested range, if the platform
    /// returned one.
    pub fn insight(&self) -> Option<&InsightSnapshot> {
        self.insights.as_ref()?.data.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub effective_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdSetRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub effective_status: Option<String>,
    /// Minor currency units, usually sent as a string.
    #[serde(default)]
    pub daily_budget: Option<Value>,
    #[serde(default)]
    pub optimization_goal: Option<String>,
}

impl AdSetRef {
    /// Daily budget in major currency units (platform sends cents).
    pub fn daily_budget_major(&self) -> f64 {
        self.daily_budget.as_ref().map(numeric).unwrap_or(0.0) / 100.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreativeRef {
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
}

impl CreativeRef {
    pub fn preview_url(&self) -> Option<&str> {
        self.thumbnail_url
            .as_deref()
            .or(self.image_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsEnvelope {
    #[serde(default)]
    pub data: Vec<InsightSnapshot>,
}

/// A single insights row: free-form metric fields plus the action lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightSnapshot {
    #[serde(default)]
    pub actions: Vec<ActionStat>,
    #[serde(default)]
    pub action_values: Vec<ActionStat>,
    #[serde(default)]
    pub video_play_actions: Vec<ActionStat>,
    #[serde(default)]
    pub video_p100_watched_actions: Vec<ActionStat>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InsightSnapshot {
    pub fn metric(&self, name: &str) -> f64 {
        self.fields.get(name).map(numeric).unwrap_or(0.0)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStat {
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub value: Value,
}

impl ActionStat {
    pub fn new(action_type: impl Into<String>, value: f64) -> Self {
        Self {
            action_type: action_type.into(),
            value: Value::from(value),
        }
    }

    pub fn amount(&self) -> f64 {
        numeric(&self.value)
    }
}

// ─── Objective ──────────────────────────────────────────────────────────────

/// Campaign objective, normalised from the platform's current (`OUTCOME_*`)
/// and legacy tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Objective {
    Sales,
    Leads,
    Messages,
    Traffic,
    Awareness,
    Engagement,
    #[default]
    Unknown,
    Other(String),
}

impl Objective {
    pub fn from_platform(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "OUTCOME_SALES" | "CONVERSIONS" | "PRODUCT_CATALOG_SALES" => Self::Sales,
            "OUTCOME_LEADS" | "LEAD_GENERATION" => Self::Leads,
            "OUTCOME_MESSAGES" | "MESSAGES" => Self::Messages,
            "OUTCOME_TRAFFIC" | "LINK_CLICKS" => Self::Traffic,
            "OUTCOME_AWARENESS" | "REACH" | "BRAND_AWARENESS" => Self::Awareness,
            "OUTCOME_ENGAGEMENT" | "POST_ENGAGEMENT" => Self::Engagement,
            "" => Self::Unknown,
            _ => Self::Other(tag.to_string()),
        }
    }

    pub fn as_platform(&self) -> &str {
        match self {
            Self::Sales => "OUTCOME_SALES",
            Self::Leads => "OUTCOME_LEADS",
            Self::Messages => "OUTCOME_MESSAGES",
            Self::Traffic => "OUTCOME_TRAFFIC",
            Self::Awareness => "OUTCOME_AWARENESS",
            Self::Engagement => "OUTCOME_ENGAGEMENT",
            Self::Unknown => "",
            Self::Other(tag) => tag,
        }
    }

    /// Sales and lead objectives are the only ones with a unit-economics
    /// model (revenue per acquisition).
    pub fn is_revenue_bearing(&self) -> bool {
        matches!(self, Self::Sales | Self::Leads)
    }
}

impl From<String> for Objective {
    fn from(tag: String) -> Self {
        Self::from_platform(&tag)
    }
}

impl From<Option<String>> for Objective {
    fn from(tag: Option<String>) -> Self {
        tag.map(Self::from).unwrap_or_default()
    }
}

impl From<Objective> for String {
    fn from(objective: Objective) -> Self {
        objective.as_platform().to_string()
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_platform())
    }
}

// ─── Date range ─────────────────────────────────────────────────────────────

/// Inclusive reporting window, as the platform's `time_range` expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    pub fn new(since: NaiveDate, until: NaiveDate) -> InsightsResult<Self> {
        if since > until {
            return Err(InsightsError::validation(format!(
                "date range start {since} is after end {until}"
            )));
        }
        Ok(Self { since, until })
    }

    /// The last `days` days ending on `today`, inclusive.
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            since: today - Duration::days(span),
            until: today,
        }
    }

    pub fn days(&self) -> i64 {
        (self.until - self.since).num_days() + 1
    }

    /// The window of `days` days ending the day before this range starts.
    pub fn preceding(&self, days: u32) -> Self {
        Self::trailing(self.since - Duration::days(1), days)
    }

    /// JSON form used in Graph API `time_range` query parameters.
    pub fn to_time_range_param(&self) -> String {
        format!(
            r#"{{"since":"{}","until":"{}"}}"#,
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.since, self.until)
    }
}
