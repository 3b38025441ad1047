//! Typed metric extraction from a single raw insights snapshot.

use insights_core::types::InsightSnapshot;
use serde::{Deserialize, Serialize};

use crate::aliases::{ActionAliasTable, CanonicalAction};

/// Flat numeric view of one ad's insights for one time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdMetrics {
    pub spend: f64,
    pub purchases: f64,
    pub revenue: f64,
    pub conversations: f64,
    pub clicks: f64,
    pub link_clicks: f64,
    pub impressions: f64,
    pub reach: f64,
    pub frequency: f64,
    pub ctr: f64,
    pub cpm: f64,
    pub cpc: f64,
    pub video_plays: f64,
    pub video_completions: f64,
}

/// Pulls [`AdMetrics`] out of raw snapshots using an alias table.
#[derive(Debug, Clone, Default)]
pub struct MetricsExtractor {
    aliases: ActionAliasTable,
}

impl MetricsExtractor {
    pub fn new(aliases: ActionAliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &ActionAliasTable {
        &self.aliases
    }

    /// Total over the input domain: missing or malformed fields read as 0.
    pub fn extract(&self, insight: &InsightSnapshot) -> AdMetrics {
        let aliases = &self.aliases;
        AdMetrics {
            spend: insight.metric("spend"),
            purchases: aliases.sum(CanonicalAction::Purchase, &insight.actions),
            revenue: aliases.sum(CanonicalAction::Purchase, &insight.action_values),
            conversations: aliases.sum(CanonicalAction::Conversation, &insight.actions),
            clicks: insight.metric("clicks"),
            link_clicks: insight.metric("inline_link_clicks"),
            impressions: insight.metric("impressions"),
            reach: insight.metric("reach"),
            frequency: insight.metric("frequency"),
            ctr: insight.metric("ctr"),
            cpm: insight.metric("cpm"),
            cpc: insight.metric("cpc"),
            video_plays: aliases.sum(CanonicalAction::VideoPlay, &insight.video_play_actions),
            video_completions: aliases.sum(
                CanonicalAction::VideoCompletion,
                &insight.video_p100_watched_actions,
            ),
        }
    }
}
