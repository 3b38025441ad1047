use chrono::NaiveDate;
use insights_core::goals::{CostConfig, UserGoals};
use insights_core::types::{DateRange, RawAdRecord};
use insights_reporting::{
    ActionAliasTable, HealthClassifier, HealthTier, HistoricalSeries, InsightsPipeline, Priority,
    RuleEngine, RuleKind,
};
use serde_json::json;
use std::sync::Arc;

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
    )
    .unwrap()
}

fn pipeline() -> InsightsPipeline {
    InsightsPipeline::new(
        ActionAliasTable::builtin(),
        CostConfig {
            avg_price: 35.0,
            direct_unit_cost: 20.0,
            variable_unit_cost: 5.0,
            fixed_costs_per_month: 0.0,
            monthly_sales_target: 1,
            target_profit_per_unit: 5.0,
        },
        Arc::new(RuleEngine::default()),
        HealthClassifier::default(),
    )
}

fn ad(id: &str, campaign: &str, objective: &str, adset: &str, insights: serde_json::Value) -> RawAdRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": format!("Ad {id}"),
        "effective_status": "ACTIVE",
        "campaign": {"id": format!("c-{campaign}"), "name": campaign, "objective": objective},
        "adset": {"id": format!("s-{adset}"), "name": adset, "daily_budget": "5000"},
        "creative": {"image_url": format!("https://cdn.example/{id}.png")},
        "insights": {"data": [insights]}
    }))
    .unwrap()
}

#[test]
fn dashboard_for_mixed_account() {
    let records = vec![
        // Winners: 3 purchase aliases all count, 10 purchases at 70 each.
        ad("1", "Sales", "OUTCOME_SALES", "Winners", json!({
            "spend": "60", "impressions": "4000", "reach": "3000", "clicks": "80",
            "actions": [
                {"action_type": "purchase", "value": "4"},
                {"action_type": "offsite_conversion.fb_pixel_purchase", "value": "3"},
                {"action_type": "omni_purchase", "value": "1"}
            ],
            "action_values": [{"action_type": "purchase", "value": "560"}]
        })),
        ad("2", "Sales", "OUTCOME_SALES", "Winners", json!({
            "spend": "40", "impressions": "2000", "reach": "2500", "clicks": "40",
            "actions": [{"action_type": "purchase", "value": "2"}],
            "action_values": [{"action_type": "purchase", "value": "140"}]
        })),
        // Burner: spent 200, returned 50.
        ad("3", "Sales", "OUTCOME_SALES", "Burner", json!({
            "spend": "200", "impressions": "10000", "reach": "6000", "clicks": "150",
            "actions": [{"action_type": "purchase", "value": "1"}],
            "action_values": [{"action_type": "purchase", "value": "50"}]
        })),
        ad("4", "Chats", "OUTCOME_ENGAGEMENT", "Inbox", json!({
            "spend": "50", "impressions": "3000", "reach": "2000", "clicks": "30",
            "actions": [{"action_type": "onsite_conversion.messaging_conversation_started_7d", "value": "20"}]
        })),
    ];

    let snapshot = pipeline()
        .build(range(), &records, &UserGoals::default(), &HistoricalSeries::default())
        .unwrap();

    assert_eq!(snapshot.overview.campaigns, 2);
    assert_eq!(snapshot.overview.adsets, 3);
    assert_eq!(snapshot.overview.ads, 4);
    assert_eq!(snapshot.overview.totals.spend, 350.0);
    assert_eq!(snapshot.overview.totals.purchases, 11.0);
    assert_eq!(snapshot.overview.totals.reach, 6000.0);

    let sales = &snapshot.campaigns[0];
    let winners = sales.adset("Winners").unwrap();
    assert_eq!(winners.totals.purchases, 10.0);
    assert_eq!(winners.totals.reach, 3000.0);
    assert!((winners.rates.roas - 7.0).abs() < 1e-9);
    assert!((winners.daily_budget - 50.0).abs() < 1e-9);
    assert_eq!(snapshot.campaigns[1].totals.conversations, 20.0);

    // Only the sales campaign's ad sets are classified.
    assert!(snapshot.health.thresholds_available);
    assert_eq!(snapshot.health.len(), 2);
    assert_eq!(snapshot.health.bucket(HealthTier::Loss)[0].adset_name, "Burner");
    assert_eq!(snapshot.bucket_totals.loss.count, 1);

    let rules: Vec<_> = snapshot.insights.iter().map(|c| c.rule()).collect();
    assert!(rules.contains(&RuleKind::ScaleOpportunity));
    assert!(rules.contains(&RuleKind::LossAlert));
    let priorities: Vec<_> = snapshot.insights.iter().map(|c| c.priority()).collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);

    assert_eq!(snapshot.top_creatives[0].ad.id, "1");
    assert_eq!(
        snapshot.top_creatives[0].ad.thumbnail_url.as_deref(),
        Some("https://cdn.example/1.png")
    );
}

#[test]
fn idle_account_gets_a_single_info_card() {
    let records = vec![ad("1", "Sales", "OUTCOME_SALES", "Tiny", json!({"spend": "5"}))];
    let snapshot = pipeline()
        .build(range(), &records, &UserGoals::default(), &HistoricalSeries::default())
        .unwrap();
    assert_eq!(snapshot.insights.len(), 1);
    assert_eq!(snapshot.insights[0].priority(), Priority::Info);
}

#[test]
fn snapshot_serializes_for_the_dashboard() {
    let snapshot = pipeline()
        .build(range(), &[], &UserGoals::default(), &HistoricalSeries::default())
        .unwrap();
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["range"]["since"], "2024-05-01");
    assert_eq!(value["alias_table_version"], "2024.06");
    assert!(value["health"]["breakEven"].is_array());
    assert_eq!(value["overview"]["campaigns"], 0);
}
