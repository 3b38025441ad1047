//! Rule-based recommendation engine.
//!
//! Every ad set above the spend floor is run through an ordered catalog of
//! independent predicate → card rules, followed by one account-wide check.
//! The output is sorted by priority (stable, so equal priorities keep rule
//! evaluation order). The engine is a pure function of its inputs.

use insights_core::config::RuleThresholds;
use insights_core::error::{InsightsError, InsightsResult};
use insights_core::goals::UserGoals;
use insights_core::types::Objective;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hierarchy::{AdSetNode, CampaignNode, Hierarchy};
use crate::history::HistoricalSeries;
use crate::ratio::{percent, ratio};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Totally ordered: `Critical > High > Medium > Low > Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ScaleOpportunity,
    LossAlert,
    MessagingCost,
    MessagingExcellence,
    CreativeFatigue,
    LandingPage,
    VideoCompletion,
    HistoricalDrop,
    TrafficCpc,
    AccountShortfall,
    Stable,
    /// Produced by an alternate analysis backend.
    External,
}

/// Metric values a card was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub cpa: f64,
    pub frequency: f64,
    pub ctr: f64,
    pub cost_per_conversation: f64,
}

/// An immutable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightCard {
    priority: Priority,
    rule: RuleKind,
    title: String,
    diagnosis: String,
    action_plan: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsSnapshot>,
}

impl InsightCard {
    pub fn new(
        priority: Priority,
        rule: RuleKind,
        title: impl Into<String>,
        diagnosis: impl Into<String>,
        action_plan: Vec<String>,
    ) -> Self {
        Self {
            priority,
            rule,
            title: title.into(),
            diagnosis: diagnosis.into(),
            action_plan,
            subject: None,
            metrics: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsSnapshot) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn rule(&self) -> RuleKind {
        self.rule
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }

    pub fn action_plan(&self) -> &[String] {
        &self.action_plan
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }
}

/// Flattened ad-set metrics, as sent by the dashboard for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSetSnapshot {
    /// Keys the ad set's daily history; falls back to `name` when absent.
    #[serde(default, alias = "adset_id", skip_serializing_if = "Option::is_none")]
    pub adset_id: Option<String>,
    pub name: String,
    #[serde(default, alias = "campaign_name")]
    pub campaign_name: String,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub purchases: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub conversations: f64,
    #[serde(default)]
    pub clicks: f64,
    #[serde(default)]
    pub impressions: f64,
    #[serde(default)]
    pub roas: f64,
    #[serde(default)]
    pub cpa: f64,
    #[serde(default, alias = "costPerConv", alias = "cost_per_conversation")]
    pub cost_per_conversation: f64,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub cpc: f64,
    #[serde(default, alias = "link_ctr")]
    pub link_ctr: Option<f64>,
    #[serde(default, alias = "video_plays")]
    pub video_plays: f64,
    #[serde(default, alias = "video_completions")]
    pub video_completions: f64,
}

impl AdSetSnapshot {
    pub fn from_node(campaign: &CampaignNode, adset: &AdSetNode) -> Self {
        let totals = &adset.totals;
        let rates = &adset.rates;
        Self {
            adset_id: Some(adset.id.clone()).filter(|id| !id.is_empty()),
            name: adset.name.clone(),
            campaign_name: campaign.name.clone(),
            objective: campaign.objective.clone(),
            spend: totals.spend,
            purchases: totals.purchases,
            revenue: totals.revenue,
            conversations: totals.conversations,
            clicks: totals.clicks,
            impressions: totals.impressions,
            roas: rates.roas,
            cpa: rates.cpa,
            cost_per_conversation: rates.cost_per_conversation,
            frequency: rates.frequency,
            ctr: rates.ctr,
            cpc: rates.cpc,
            link_ctr: (totals.link_clicks > 0.0).then_some(rates.link_ctr),
            video_plays: totals.video_plays,
            video_completions: totals.video_completions,
        }
    }

    pub fn from_hierarchy(hierarchy: &Hierarchy) -> Vec<Self> {
        hierarchy
            .adsets()
            .map(|(campaign, adset)| Self::from_node(campaign, adset))
            .collect()
    }

    pub fn history_key(&self) -> &str {
        self.adset_id.as_deref().unwrap_or(&self.name)
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            spend: self.spend,
            revenue: self.revenue,
            roas: self.roas,
            cpa: self.cpa,
            frequency: self.frequency,
            ctr: self.ctr,
            cost_per_conversation: self.cost_per_conversation,
        }
    }
}

/// Analysis request body. Goals and ad-set data are required as a whole;
/// individual goal fields fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub user_goals: Option<UserGoals>,
    #[serde(default)]
    pub adsets_data: Option<Vec<AdSetSnapshot>>,
    #[serde(default)]
    pub history: Option<HistoricalSeries>,
}

impl AnalysisRequest {
    /// Reject incomplete requests before any rule runs.
    pub fn into_parts(self) -> InsightsResult<(UserGoals, Vec<AdSetSnapshot>, HistoricalSeries)> {
        let goals = self
            .user_goals
            .ok_or_else(|| InsightsError::validation("userGoals is required"))?;
        goals.validate()?;

        let adsets = match self.adsets_data {
            Some(adsets) if !adsets.is_empty() => adsets,
            _ => return Err(InsightsError::validation("adsetsData must contain at least one ad set")),
        };
        if let Some(bad) = adsets
            .iter()
            .find(|a| !(a.spend.is_finite() && a.roas.is_finite() && a.cpa.is_finite()))
        {
            return Err(InsightsError::validation(format!(
                "ad set '{}' carries non-finite metrics",
                bad.name
            )));
        }

        Ok((goals, adsets, self.history.unwrap_or_default()))
    }
}

/// Anything that turns ad-set snapshots into insight cards.
pub trait InsightBackend: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(
        &self,
        goals: &UserGoals,
        adsets: &[AdSetSnapshot],
        history: &HistoricalSeries,
    ) -> InsightsResult<Vec<InsightCard>>;
}

// ---------------------------------------------------------------------------
// RuleEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
}

impl RuleEngine {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    pub fn evaluate(
        &self,
        goals: &UserGoals,
        adsets: &[AdSetSnapshot],
        history: &HistoricalSeries,
    ) -> Vec<InsightCard> {
        let mut cards = Vec::new();

        for adset in adsets {
            if adset.spend < self.thresholds.min_spend {
                debug!(adset = %adset.name, spend = adset.spend, "Below spend floor, skipping");
                continue;
            }
            self.scale_opportunity(goals, adset, &mut cards);
            self.loss_alert(goals, adset, &mut cards);
            self.messaging_cost(adset, &mut cards);
            self.messaging_excellence(adset, &mut cards);
            self.creative_fatigue(adset, &mut cards);
            self.landing_page(goals, adset, &mut cards);
            self.video_completion(adset, &mut cards);
            self.historical_drop(adset, history, &mut cards);
            self.traffic_cpc(adset, &mut cards);
        }
        self.account_shortfall(goals, adsets, &mut cards);

        if cards.is_empty() {
            cards.push(stable_card());
        }

        cards.sort_by(|a, b| b.priority.cmp(&a.priority));
        metrics::counter!("rules.cards_emitted").increment(cards.len() as u64);
        cards
    }

    fn scale_opportunity(&self, goals: &UserGoals, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if !adset.objective.is_revenue_bearing()
            || adset.roas < goals.roas_goal
            || adset.cpa > goals.cpa_goal
        {
            return;
        }
        let premium = adset.frequency > 0.0
            && adset.frequency < self.thresholds.scale_premium_max_frequency;
        let (priority, title) = if premium {
            (Priority::Critical, "Premium scale opportunity")
        } else {
            (Priority::High, "Scale opportunity")
        };
        let mut diagnosis = format!(
            "Ad set '{}' returns ROAS {:.2} (goal {:.2}) at CPA {:.2} (ceiling {:.2}).",
            adset.name, adset.roas, goals.roas_goal, adset.cpa, goals.cpa_goal
        );
        if premium {
            diagnosis.push_str(&format!(
                " Frequency is only {:.2}, so the audience is far from saturated.",
                adset.frequency
            ));
        }
        cards.push(
            InsightCard::new(
                priority,
                RuleKind::ScaleOpportunity,
                title,
                diagnosis,
                vec![
                    "Increase the daily budget by 20-30%.".to_string(),
                    "Wait 3-4 days for delivery to stabilise before the next increase.".to_string(),
                    "Duplicate the ad set to test broader audiences.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn loss_alert(&self, goals: &UserGoals, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        let floor = goals.cpa_goal * self.thresholds.loss_spend_cpa_multiplier;
        if !adset.objective.is_revenue_bearing()
            || adset.roas >= self.thresholds.loss_max_roas
            || adset.spend <= floor
        {
            return;
        }
        let priority = if adset.spend > goals.cpa_goal * self.thresholds.loss_critical_cpa_multiplier {
            Priority::Critical
        } else {
            Priority::High
        };
        cards.push(
            InsightCard::new(
                priority,
                RuleKind::LossAlert,
                "Loss alert",
                format!(
                    "Ad set '{}' spent {:.2} and returned only {:.2} in revenue (ROAS {:.2}).",
                    adset.name, adset.spend, adset.revenue, adset.roas
                ),
                vec![
                    "Pause the ad set immediately.".to_string(),
                    "Review targeting, offer and creatives before reactivating.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    /// Spend with no conversation at all counts as over the ceiling. Callers
    /// have already applied the spend floor.
    fn messaging_cost(&self, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if adset.objective != Objective::Messages {
            return;
        }
        let diagnosis = if adset.conversations <= 0.0 {
            format!(
                "Ad set '{}' spent {:.2} without starting a single conversation (ceiling {:.2} each).",
                adset.name, adset.spend, self.thresholds.messaging_high_cost
            )
        } else if adset.cost_per_conversation > self.thresholds.messaging_high_cost {
            format!(
                "Ad set '{}' pays {:.2} per started conversation (ceiling {:.2}).",
                adset.name, adset.cost_per_conversation, self.thresholds.messaging_high_cost
            )
        } else {
            return;
        };
        cards.push(
            InsightCard::new(
                Priority::Medium,
                RuleKind::MessagingCost,
                "High cost per conversation",
                diagnosis,
                vec![
                    "Review the call to action and make the message prompt explicit.".to_string(),
                    "Test new creatives that invite a direct question.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn messaging_excellence(&self, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if adset.objective != Objective::Messages
            || adset.conversations <= 0.0
            || adset.cost_per_conversation >= self.thresholds.messaging_low_cost
        {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::High,
                RuleKind::MessagingExcellence,
                "Cheap conversations",
                format!(
                    "Ad set '{}' starts conversations at {:.2} each across {:.0} conversations.",
                    adset.name, adset.cost_per_conversation, adset.conversations
                ),
                vec![
                    "Increase the daily budget by 20-30%.".to_string(),
                    "Make sure the team can answer the extra volume quickly.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn creative_fatigue(&self, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if adset.frequency <= self.thresholds.fatigue_min_frequency
            || adset.ctr >= self.thresholds.fatigue_max_ctr
        {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::High,
                RuleKind::CreativeFatigue,
                "Creative fatigue",
                format!(
                    "Ad set '{}' shows frequency {:.2} with CTR down to {:.2}%.",
                    adset.name, adset.frequency, adset.ctr
                ),
                vec![
                    "Refresh the creatives with new angles or formats.".to_string(),
                    "Broaden the audience to lower frequency.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn landing_page(&self, goals: &UserGoals, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        let ctr = adset.link_ctr.unwrap_or(adset.ctr);
        if !adset.objective.is_revenue_bearing()
            || ctr <= self.thresholds.landing_min_ctr
            || adset.roas >= goals.roas_goal * self.thresholds.landing_roas_fraction
        {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::Medium,
                RuleKind::LandingPage,
                "Clicks are not converting",
                format!(
                    "Ad set '{}' gets a {:.2}% CTR but only ROAS {:.2} against a goal of {:.2}.",
                    adset.name, ctr, adset.roas, goals.roas_goal
                ),
                vec![
                    "Audit the landing page load time and mobile layout.".to_string(),
                    "Check that the offer and price match the ad.".to_string(),
                    "Verify checkout and pixel events fire correctly.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn video_completion(&self, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if adset.video_plays <= 0.0 {
            return;
        }
        let completion = percent(adset.video_completions, adset.video_plays);
        if completion >= self.thresholds.video_min_completion_pct {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::Medium,
                RuleKind::VideoCompletion,
                "Video drop-off",
                format!(
                    "Only {:.1}% of video plays in ad set '{}' reach the end.",
                    completion, adset.name
                ),
                vec![
                    "Shorten the video.".to_string(),
                    "Put the hook and the offer in the first three seconds.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn historical_drop(
        &self,
        adset: &AdSetSnapshot,
        history: &HistoricalSeries,
        cards: &mut Vec<InsightCard>,
    ) {
        let Some(trailing) = history.trailing_roas(
            adset.history_key(),
            self.thresholds.history_window_days,
            self.thresholds.history_min_days,
        ) else {
            return;
        };
        if adset.roas >= trailing * self.thresholds.history_roas_fraction {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::High,
                RuleKind::HistoricalDrop,
                "Performance dropped",
                format!(
                    "Ad set '{}' is at ROAS {:.2}, down from a trailing average of {:.2}.",
                    adset.name, adset.roas, trailing
                ),
                vec![
                    "Check recent edits to budget, audience or creatives.".to_string(),
                    "Compare against seasonality and competitor activity.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    fn traffic_cpc(&self, adset: &AdSetSnapshot, cards: &mut Vec<InsightCard>) {
        if adset.objective != Objective::Traffic || adset.cpc <= self.thresholds.traffic_max_cpc {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::Medium,
                RuleKind::TrafficCpc,
                "Expensive clicks",
                format!(
                    "Ad set '{}' pays {:.2} per click (ceiling {:.2}).",
                    adset.name, adset.cpc, self.thresholds.traffic_max_cpc
                ),
                vec![
                    "Test more thumb-stopping creatives.".to_string(),
                    "Refine targeting to cheaper placements and audiences.".to_string(),
                ],
            )
            .with_subject(&adset.name)
            .with_metrics(adset.snapshot()),
        );
    }

    /// Aggregate over sales/lead ad sets only; other objectives carry no
    /// revenue signal.
    fn account_shortfall(&self, goals: &UserGoals, adsets: &[AdSetSnapshot], cards: &mut Vec<InsightCard>) {
        let revenue_sets = adsets.iter().filter(|a| a.objective.is_revenue_bearing());
        let (spend, revenue) = revenue_sets.fold((0.0, 0.0), |(s, r), a| (s + a.spend, r + a.revenue));
        if spend < self.thresholds.min_spend || spend <= 0.0 {
            return;
        }
        let roas = ratio(revenue, spend);
        if roas >= goals.roas_goal * self.thresholds.account_roas_fraction {
            return;
        }
        cards.push(
            InsightCard::new(
                Priority::Critical,
                RuleKind::AccountShortfall,
                "Account below target",
                format!(
                    "Sales and lead ad sets return ROAS {:.2} overall ({:.2} revenue on {:.2} spend), against a goal of {:.2}.",
                    roas, revenue, spend, goals.roas_goal
                ),
                vec![
                    "Pause the worst performing ad sets.".to_string(),
                    "Move their budget to the ad sets above goal.".to_string(),
                ],
            )
            .with_metrics(MetricsSnapshot {
                spend,
                revenue,
                roas,
                ..Default::default()
            }),
        );
    }
}

fn stable_card() -> InsightCard {
    InsightCard::new(
        Priority::Info,
        RuleKind::Stable,
        "Campaigns are stable",
        "No ad set triggered a recommendation for this period.",
        vec!["Keep monitoring daily and revisit goals weekly.".to_string()],
    )
}

impl InsightBackend for RuleEngine {
    fn name(&self) -> &str {
        "rules"
    }

    fn analyze(
        &self,
        goals: &UserGoals,
        adsets: &[AdSetSnapshot],
        history: &HistoricalSeries,
    ) -> InsightsResult<Vec<InsightCard>> {
        Ok(self.evaluate(goals, adsets, history))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
