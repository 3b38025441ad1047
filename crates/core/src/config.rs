use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, InsightsResult};
use crate::goals::{require_non_negative, require_positive, CostConfig, UserGoals};

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADS_INSIGHTS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub goals: UserGoals,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub rules: RuleThresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Marketing Graph API connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub ad_account_id: String,
    /// Used only when a request carries no bearer token of its own.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Hard bound on pages followed per fetch.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// Tunable thresholds for the recommendation rules and health tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Ad sets spending less than this are skipped entirely.
    #[serde(default = "default_min_spend")]
    pub min_spend: f64,
    #[serde(default = "default_scale_premium_max_frequency")]
    pub scale_premium_max_frequency: f64,
    #[serde(default = "default_loss_max_roas")]
    pub loss_max_roas: f64,
    #[serde(default = "default_loss_spend_cpa_multiplier")]
    pub loss_spend_cpa_multiplier: f64,
    #[serde(default = "default_loss_critical_cpa_multiplier")]
    pub loss_critical_cpa_multiplier: f64,
    #[serde(default = "default_messaging_high_cost")]
    pub messaging_high_cost: f64,
    #[serde(default = "default_messaging_low_cost")]
    pub messaging_low_cost: f64,
    #[serde(default = "default_fatigue_min_frequency")]
    pub fatigue_min_frequency: f64,
    #[serde(default = "default_fatigue_max_ctr")]
    pub fatigue_max_ctr: f64,
    #[serde(default = "default_landing_min_ctr")]
    pub landing_min_ctr: f64,
    #[serde(default = "default_landing_roas_fraction")]
    pub landing_roas_fraction: f64,
    #[serde(default = "default_video_min_completion_pct")]
    pub video_min_completion_pct: f64,
    #[serde(default = "default_history_roas_fraction")]
    pub history_roas_fraction: f64,
    #[serde(default = "default_history_window_days")]
    pub history_window_days: u32,
    #[serde(default = "default_history_min_days")]
    pub history_min_days: usize,
    #[serde(default = "default_traffic_max_cpc")]
    pub traffic_max_cpc: f64,
    #[serde(default = "default_account_roas_fraction")]
    pub account_roas_fraction: f64,
    #[serde(default = "default_health_scale_multiplier")]
    pub health_scale_multiplier: f64,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_graph_api_version() -> String {
    "v19.0".to_string()
}
fn default_page_limit() -> u32 {
    500
}
fn default_max_pages() -> usize {
    50
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_cache_ttl_secs() -> u64 {
    15 * 60
}
fn default_cache_max_entries() -> usize {
    100
}
fn default_min_spend() -> f64 {
    20.0
}
fn default_scale_premium_max_frequency() -> f64 {
    2.0
}
fn default_loss_max_roas() -> f64 {
    1.0
}
fn default_loss_spend_cpa_multiplier() -> f64 {
    2.0
}
fn default_loss_critical_cpa_multiplier() -> f64 {
    5.0
}
fn default_messaging_high_cost() -> f64 {
    15.0
}
fn default_messaging_low_cost() -> f64 {
    5.0
}
fn default_fatigue_min_frequency() -> f64 {
    3.5
}
fn default_fatigue_max_ctr() -> f64 {
    1.0
}
fn default_landing_min_ctr() -> f64 {
    2.0
}
fn default_landing_roas_fraction() -> f64 {
    0.5
}
fn default_video_min_completion_pct() -> f64 {
    25.0
}
fn default_history_roas_fraction() -> f64 {
    0.7
}
fn default_history_window_days() -> u32 {
    7
}
fn default_history_min_days() -> usize {
    3
}
fn default_traffic_max_cpc() -> f64 {
    2.0
}
fn default_account_roas_fraction() -> f64 {
    0.5
}
fn default_health_scale_multiplier() -> f64 {
    1.5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            api_version: default_graph_api_version(),
            ad_account_id: String::new(),
            access_token: None,
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            min_spend: default_min_spend(),
            scale_premium_max_frequency: default_scale_premium_max_frequency(),
            loss_max_roas: default_loss_max_roas(),
            loss_spend_cpa_multiplier: default_loss_spend_cpa_multiplier(),
            loss_critical_cpa_multiplier: default_loss_critical_cpa_multiplier(),
            messaging_high_cost: default_messaging_high_cost(),
            messaging_low_cost: default_messaging_low_cost(),
            fatigue_min_frequency: default_fatigue_min_frequency(),
            fatigue_max_ctr: default_fatigue_max_ctr(),
            landing_min_ctr: default_landing_min_ctr(),
            landing_roas_fraction: default_landing_roas_fraction(),
            video_min_completion_pct: default_video_min_completion_pct(),
            history_roas_fraction: default_history_roas_fraction(),
            history_window_days: default_history_window_days(),
            history_min_days: default_history_min_days(),
            traffic_max_cpc: default_traffic_max_cpc(),
            account_roas_fraction: default_account_roas_fraction(),
            health_scale_multiplier: default_health_scale_multiplier(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            graph: GraphConfig::default(),
            cache: CacheConfig::default(),
            goals: UserGoals::default(),
            costs: CostConfig::default(),
            rules: RuleThresholds::default(),
        }
    }
}

impl RuleThresholds {
    pub fn validate(&self) -> InsightsResult<()> {
        require_non_negative("rules.min_spend", self.min_spend)?;
        for (field, value) in [
            ("rules.scale_premium_max_frequency", self.scale_premium_max_frequency),
            ("rules.loss_max_roas", self.loss_max_roas),
            ("rules.loss_spend_cpa_multiplier", self.loss_spend_cpa_multiplier),
            ("rules.loss_critical_cpa_multiplier", self.loss_critical_cpa_multiplier),
            ("rules.messaging_high_cost", self.messaging_high_cost),
            ("rules.messaging_low_cost", self.messaging_low_cost),
            ("rules.fatigue_min_frequency", self.fatigue_min_frequency),
            ("rules.fatigue_max_ctr", self.fatigue_max_ctr),
            ("rules.landing_min_ctr", self.landing_min_ctr),
            ("rules.landing_roas_fraction", self.landing_roas_fraction),
            ("rules.video_min_completion_pct", self.video_min_completion_pct),
            ("rules.history_roas_fraction", self.history_roas_fraction),
            ("rules.traffic_max_cpc", self.traffic_max_cpc),
            ("rules.account_roas_fraction", self.account_roas_fraction),
            ("rules.health_scale_multiplier", self.health_scale_multiplier),
        ] {
            require_positive(field, value)?;
        }
        if self.messaging_low_cost >= self.messaging_high_cost {
            return Err(InsightsError::validation(
                "rules.messaging_low_cost must be below rules.messaging_high_cost",
            ));
        }
        if self.history_window_days == 0 {
            return Err(InsightsError::validation(
                "rules.history_window_days must be at least 1",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADS_INSIGHTS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject configurations the pipeline cannot run on.
    pub fn validate(&self) -> InsightsResult<()> {
        self.goals.validate()?;
        self.costs.validate()?;
        self.rules.validate()?;
        if self.graph.max_pages == 0 {
            return Err(InsightsError::Config("graph.max_pages must be at least 1".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(InsightsError::Config("cache.max_entries must be at least 1".into()));
        }
        Ok(())
    }
}
