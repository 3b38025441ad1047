//! Versioned table mapping platform action-type tags onto canonical metrics.
//!
//! The ads platform reports one semantic action under several tags (pixel,
//! offsite, onsite, omni variants, dated messaging variants). The table is
//! plain data so a tag change on the platform side is a table update.

use insights_core::types::ActionStat;
use serde::{Deserialize, Serialize};

pub const ALIAS_TABLE_VERSION: &str = "2024.06";

/// Metric an action tag contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalAction {
    Purchase,
    Conversation,
    VideoPlay,
    VideoCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "tag", rename_all = "snake_case")]
pub enum ActionPattern {
    Exact(String),
    Contains(String),
}

impl ActionPattern {
    pub fn matches(&self, action_type: &str) -> bool {
        match self {
            Self::Exact(tag) => action_type == tag,
            Self::Contains(fragment) => action_type.contains(fragment.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub action: CanonicalAction,
    pub pattern: ActionPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAliasTable {
    pub version: String,
    pub entries: Vec<AliasEntry>,
}

impl ActionAliasTable {
    pub fn builtin() -> Self {
        use CanonicalAction::*;

        let exact = |action, tag: &str| AliasEntry {
            action,
            pattern: ActionPattern::Exact(tag.to_string()),
        };
        let entries = vec![
            exact(Purchase, "purchase"),
            exact(Purchase, "omni_purchase"),
            exact(Purchase, "offsite_conversion.fb_pixel_purchase"),
            exact(Purchase, "onsite_conversion.purchase"),
            AliasEntry {
                action: Conversation,
                pattern: ActionPattern::Contains("messaging_conversation_started".to_string()),
            },
            // Play and completion counts live in separate action lists.
            exact(VideoPlay, "video_view"),
            exact(VideoCompletion, "video_view"),
        ];

        Self {
            version: ALIAS_TABLE_VERSION.to_string(),
            entries,
        }
    }

    pub fn matches(&self, action: CanonicalAction, action_type: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.action == action && e.pattern.matches(action_type))
    }

    /// Sum of every stat whose tag is an alias of `action`. A stat matching
    /// several aliases of the same action is counted once.
    pub fn sum(&self, action: CanonicalAction, stats: &[ActionStat]) -> f64 {
        stats
            .iter()
            .filter(|s| self.matches(action, &s.action_type))
            .map(ActionStat::amount)
            .sum()
    }
}

impl Default for ActionAliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_purchase_aliases_cover_pixel_and_onsite_variants() {
        let table = ActionAliasTable::builtin();
        for tag in [
            "purchase",
            "omni_purchase",
            "offsite_conversion.fb_pixel_purchase",
            "onsite_conversion.purchase",
        ] {
            assert!(table.matches(CanonicalAction::Purchase, tag), "{tag}");
        }
        assert!(!table.matches(CanonicalAction::Purchase, "add_to_cart"));
        assert_eq!(table.version, ALIAS_TABLE_VERSION);
    }

    #[test]
    fn conversation_family_matches_dated_variants() {
        let table = ActionAliasTable::builtin();
        assert!(table.matches(
            CanonicalAction::Conversation,
            "onsite_conversion.messaging_conversation_started_7d"
        ));
        assert!(table.matches(
            CanonicalAction::Conversation,
            "messaging_conversation_started_28d"
        ));
        assert!(!table.matches(
            CanonicalAction::Conversation,
            "onsite_conversion.messaging_block"
        ));
    }

    #[test]
    fn overlapping_patterns_count_a_stat_once() {
        let mut table = ActionAliasTable::builtin();
        table.entries.push(AliasEntry {
            action: CanonicalAction::Purchase,
            pattern: ActionPattern::Contains("purchase".to_string()),
        });
        let stats = vec![ActionStat::new("purchase", 2.0)];
        assert_eq!(table.sum(CanonicalAction::Purchase, &stats), 2.0);
    }

    #[test]
    fn table_loads_from_data() {
        let json = r#"{
            "version": "test",
            "entries": [
                {"action": "purchase", "pattern": {"match": "exact", "tag": "web_purchase"}}
            ]
        }"#;
        let table: ActionAliasTable = serde_json::from_str(json).unwrap();
        assert!(table.matches(CanonicalAction::Purchase, "web_purchase"));
        assert!(!table.matches(CanonicalAction::Purchase, "purchase"));
    }
}
