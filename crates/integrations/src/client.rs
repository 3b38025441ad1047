//! Graph API client for one ad account: cached paginated reads and
//! cache-invalidating writes.

use insights_cache::{CacheKey, ResponseCache};
use insights_core::config::GraphConfig;
use insights_core::error::{InsightsError, InsightsResult};
use insights_core::types::{DateRange, InsightSnapshot, RawAdRecord};
use insights_reporting::demographics::BreakdownDimension;
use insights_reporting::extractor::MetricsExtractor;
use insights_reporting::history::HistoricalSeries;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::mutation::{BudgetUpdate, MutationOutcome, StatusUpdate};
use crate::pagination::fetch_all;
use crate::transport::GraphTransport;

const INSIGHT_FIELDS: &str = "spend,impressions,reach,frequency,clicks,inline_link_clicks,ctr,cpm,cpc,\
actions,action_values,video_play_actions,video_p100_watched_actions";

const DAILY_FIELDS: &str = "adset_id,adset_name,spend,actions,action_values";

/// Cached response bodies. Typed so hits skip deserialization.
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Ads(Arc<Vec<RawAdRecord>>),
    Rows(Arc<Vec<InsightSnapshot>>),
}

pub struct MetaGraphClient {
    transport: Arc<dyn GraphTransport>,
    config: GraphConfig,
    cache: ResponseCache<CachedPayload>,
}

impl MetaGraphClient {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        config: GraphConfig,
        cache: ResponseCache<CachedPayload>,
    ) -> InsightsResult<Self> {
        if config.ad_account_id.trim().is_empty() {
            return Err(InsightsError::Config("graph.ad_account_id is not set".into()));
        }
        if config.max_pages == 0 {
            return Err(InsightsError::Config("graph.max_pages must be at least 1".into()));
        }
        Ok(Self {
            transport,
            config,
            cache,
        })
    }

    pub fn cache(&self) -> &ResponseCache<CachedPayload> {
        &self.cache
    }

    /// The request's bearer token, else the configured fallback token.
    pub fn token<'a>(&'a self, bearer: Option<&'a str>) -> Option<&'a str> {
        bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or(self.config.access_token.as_deref())
    }

    fn account(&self) -> String {
        let id = self.config.ad_account_id.trim();
        if id.starts_with("act_") {
            id.to_string()
        } else {
            format!("act_{id}")
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> InsightsResult<Url> {
        let raw = format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| InsightsError::Config(format!("invalid Graph API URL {raw}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    /// Every ad in the account with campaign, ad set, creative and the
    /// insights for `range` nested inline.
    pub async fn fetch_ads(
        &self,
        token: &str,
        range: DateRange,
        refresh: bool,
    ) -> InsightsResult<Arc<Vec<RawAdRecord>>> {
        let key = CacheKey::new("ads", Some(range));
        if !refresh {
            if let Some(CachedPayload::Ads(ads)) = self.cache.get(&key) {
                return Ok(ads);
            }
        }

        let fields = format!(
            "id,name,status,effective_status,\
             campaign{{id,name,objective,status,effective_status}},\
             adset{{id,name,status,effective_status,daily_budget,optimization_goal}},\
             creative{{thumbnail_url,image_url,permalink_url}},\
             insights.time_range({}){{{INSIGHT_FIELDS}}}",
            range.to_time_range_param()
        );
        let url = self.endpoint(
            &format!("{}/ads", self.account()),
            &[("fields", fields), ("limit", self.config.page_limit.to_string())],
        )?;

        let ads: Vec<RawAdRecord> =
            fetch_all(self.transport.as_ref(), url, token, self.config.max_pages).await?;
        info!(range = %range, ads = ads.len(), "Fetched ads");

        let ads = Arc::new(ads);
        self.cache.put(key, CachedPayload::Ads(Arc::clone(&ads)));
        Ok(ads)
    }

    async fn fetch_rows(
        &self,
        resource: String,
        token: &str,
        range: DateRange,
        params: Vec<(&str, String)>,
        refresh: bool,
    ) -> InsightsResult<Arc<Vec<InsightSnapshot>>> {
        let key = CacheKey::new(resource, Some(range));
        if !refresh {
            if let Some(CachedPayload::Rows(rows)) = self.cache.get(&key) {
                return Ok(rows);
            }
        }

        let mut params = params;
        params.push(("time_range", range.to_time_range_param()));
        params.push(("limit", self.config.page_limit.to_string()));
        let url = self.endpoint(&format!("{}/insights", self.account()), &params)?;

        let rows: Vec<InsightSnapshot> =
            fetch_all(self.transport.as_ref(), url, token, self.config.max_pages).await?;
        info!(resource = %key.resource, range = %range, rows = rows.len(), "Fetched insight rows");

        let rows = Arc::new(rows);
        self.cache.put(key, CachedPayload::Rows(Arc::clone(&rows)));
        Ok(rows)
    }

    /// Ad-set level insights, one row per ad set per day.
    pub async fn fetch_adset_daily(
        &self,
        token: &str,
        range: DateRange,
        refresh: bool,
    ) -> InsightsResult<Arc<Vec<InsightSnapshot>>> {
        self.fetch_rows(
            "adset_daily".to_string(),
            token,
            range,
            vec![
                ("level", "adset".to_string()),
                ("time_increment", "1".to_string()),
                ("fields", DAILY_FIELDS.to_string()),
            ],
            refresh,
        )
        .await
    }

    /// Daily series for the `window_days` days before `range`.
    pub async fn fetch_history(
        &self,
        token: &str,
        range: DateRange,
        window_days: u32,
        extractor: &MetricsExtractor,
        refresh: bool,
    ) -> InsightsResult<HistoricalSeries> {
        let window = range.preceding(window_days);
        let rows = self.fetch_adset_daily(token, window, refresh).await?;
        Ok(HistoricalSeries::from_daily_rows(extractor, &rows))
    }

    pub async fn fetch_breakdown(
        &self,
        token: &str,
        range: DateRange,
        dimension: BreakdownDimension,
        refresh: bool,
    ) -> InsightsResult<Arc<Vec<InsightSnapshot>>> {
        self.fetch_rows(
            format!("breakdown:{dimension}"),
            token,
            range,
            vec![
                ("level", "account".to_string()),
                ("breakdowns", dimension.as_param().to_string()),
                ("fields", INSIGHT_FIELDS.to_string()),
            ],
            refresh,
        )
        .await
    }

    /// Age and gender breakdowns, fetched concurrently. Either failing fails
    /// both.
    pub async fn fetch_demographics(
        &self,
        token: &str,
        range: DateRange,
        refresh: bool,
    ) -> InsightsResult<Vec<(BreakdownDimension, Vec<InsightSnapshot>)>> {
        let (age, gender) = tokio::try_join!(
            self.fetch_breakdown(token, range, BreakdownDimension::Age, refresh),
            self.fetch_breakdown(token, range, BreakdownDimension::Gender, refresh),
        )?;
        Ok(vec![
            (BreakdownDimension::Age, age.as_ref().clone()),
            (BreakdownDimension::Gender, gender.as_ref().clone()),
        ])
    }

    // ── Writes ─────────────────────────────────────────────────────────────

    pub async fn update_status(&self, token: &str, update: &StatusUpdate) -> InsightsResult<MutationOutcome> {
        info!(entity = %update.entity_id, status = %update.status, "Updating delivery status");
        self.mutate(token, &update.entity_id, update.form()).await
    }

    pub async fn update_budget(&self, token: &str, update: &BudgetUpdate) -> InsightsResult<MutationOutcome> {
        info!(
            entity = %update.entity_id,
            minor_units = update.daily_budget_minor_units,
            "Updating daily budget"
        );
        self.mutate(token, &update.entity_id, update.form()).await
    }

    async fn mutate(
        &self,
        token: &str,
        entity_id: &str,
        form: Vec<(String, String)>,
    ) -> InsightsResult<MutationOutcome> {
        let url = self.endpoint(entity_id, &[])?;
        let body = self.transport.post(&url, token, &form).await?;
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);

        if success {
            let dropped = self.cache.invalidate_all();
            debug!(entity = entity_id, dropped, "Cache invalidated after write");
        } else {
            warn!(entity = entity_id, body = %body, "Write was not acknowledged");
        }

        Ok(MutationOutcome {
            entity_id: entity_id.to_string(),
            success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::DeliveryStatus;
    use crate::scripted::ScriptedTransport;
    use chrono::NaiveDate;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
        )
        .unwrap()
    }

    fn config() -> GraphConfig {
        GraphConfig {
            base_url: "https://graph.example".to_string(),
            ad_account_id: "1234".to_string(),
            access_token: Some("fallback".to_string()),
            ..Default::default()
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> MetaGraphClient {
        MetaGraphClient::new(transport, config(), ResponseCache::from_secs(60, 10)).unwrap()
    }

    fn ads_page() -> Value {
        json!({"data": [{
            "id": "ad1",
            "name": "Ad 1",
            "campaign": {"id": "c1", "name": "Camp", "objective": "OUTCOME_SALES"},
            "adset": {"id": "s1", "name": "Set", "daily_budget": "2000"},
            "insights": {"data": [{"spend": "12.5"}]}
        }]})
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn reads_are_cached_until_refresh() {
        let transport = Arc::new(ScriptedTransport::new().on("/act_1234/ads", None, ads_page()));
        let client = client(Arc::clone(&transport));

        let first = client.fetch_ads("t", range(), false).await.unwrap();
        let second = client.fetch_ads("t", range(), false).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.call_count("GET"), 1);

        client.fetch_ads("t", range(), true).await.unwrap();
        assert_eq!(transport.call_count("GET"), 2);

        let call = &transport.calls()[0];
        assert_eq!(call.url.path(), "/v19.0/act_1234/ads");
        let fields = query_value(&call.url, "fields").unwrap();
        assert!(fields.contains(r#"insights.time_range({"since":"2024-05-01","until":"2024-05-07"})"#));
        assert!(fields.contains("creative{thumbnail_url,image_url,permalink_url}"));
        assert_eq!(query_value(&call.url, "limit").as_deref(), Some("500"));
    }

    #[tokio::test]
    async fn upstream_errors_propagate_and_are_not_cached() {
        let transport = Arc::new(ScriptedTransport::new().fail(
            "/act_1234/ads",
            None,
            401,
            json!({"error": {"message": "Session has expired", "code": 190}}),
        ));
        let client = client(Arc::clone(&transport));

        let err = client.fetch_ads("t", range(), false).await.unwrap_err();
        assert!(matches!(err, InsightsError::Upstream { status: 401, .. }));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn demographics_fetch_both_dimensions() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/act_1234/insights", Some("breakdowns=age"), json!({"data": [{"age": "25-34", "spend": "5"}]}))
                .on("/act_1234/insights", Some("breakdowns=gender"), json!({"data": [{"gender": "male", "spend": "7"}]})),
        );
        let client = client(Arc::clone(&transport));

        let batches = client.fetch_demographics("t", range(), false).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, BreakdownDimension::Age);
        assert_eq!(batches[0].1[0].text("age"), Some("25-34"));
        assert_eq!(batches[1].1[0].text("gender"), Some("male"));
        assert_eq!(transport.call_count("GET"), 2);
    }

    #[tokio::test]
    async fn demographics_fail_together() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/act_1234/insights", Some("breakdowns=age"), json!({"data": []}))
                .fail("/act_1234/insights", Some("breakdowns=gender"), 500, json!({"error": {}})),
        );
        let client = client(transport);
        assert!(client.fetch_demographics("t", range(), false).await.is_err());
    }

    #[tokio::test]
    async fn history_covers_the_preceding_window() {
        let transport = Arc::new(ScriptedTransport::new().on(
            "/act_1234/insights",
            Some("time_increment=1"),
            json!({"data": [
                {"adset_id": "s1", "adset_name": "Set", "date_start": "2024-04-30", "spend": "10",
                 "action_values": [{"action_type": "purchase", "value": "50"}]}
            ]}),
        ));
        let client = client(Arc::clone(&transport));

        let history = client
            .fetch_history("t", range(), 7, &MetricsExtractor::default(), false)
            .await
            .unwrap();
        assert_eq!(history.points("s1").len(), 1);

        let url = &transport.calls()[0].url;
        assert_eq!(
            query_value(url, "time_range").as_deref(),
            Some(r#"{"since":"2024-04-24","until":"2024-04-30"}"#)
        );
        assert_eq!(query_value(url, "level").as_deref(), Some("adset"));
    }

    #[tokio::test]
    async fn writes_invalidate_the_cache() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/act_1234/ads", None, ads_page())
                .on("/v19.0/s1", None, json!({"success": true})),
        );
        let client = client(Arc::clone(&transport));
        client.fetch_ads("t", range(), false).await.unwrap();
        assert_eq!(client.cache().len(), 1);

        let update = StatusUpdate::new("s1", DeliveryStatus::Paused).unwrap();
        let outcome = client.update_status("t", &update).await.unwrap();
        assert!(outcome.success);
        assert!(client.cache().is_empty());

        let post = transport
            .calls()
            .into_iter()
            .find(|c| c.method == "POST")
            .unwrap();
        assert_eq!(post.url.path(), "/v19.0/s1");
        assert_eq!(post.form, vec![("status".to_string(), "PAUSED".to_string())]);

        let budget = BudgetUpdate::from_major("s1", 42.0).unwrap();
        client.update_budget("t", &budget).await.unwrap();
        let last = transport.calls().pop().unwrap();
        assert_eq!(last.form, vec![("daily_budget".to_string(), "4200".to_string())]);
    }

    #[tokio::test]
    async fn unacknowledged_write_keeps_cache() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("/act_1234/ads", None, ads_page())
                .on("/v19.0/s1", None, json!({"success": false})),
        );
        let client = client(Arc::clone(&transport));
        client.fetch_ads("t", range(), false).await.unwrap();

        let budget = BudgetUpdate::from_major("s1", 10.0).unwrap();
        let outcome = client.update_budget("t", &budget).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(client.cache().len(), 1);
    }

    #[test]
    fn bearer_token_wins_over_configured_token() {
        let client = client(Arc::new(ScriptedTransport::new()));
        assert_eq!(client.token(Some("from-header")), Some("from-header"));
        assert_eq!(client.token(Some("  ")), Some("fallback"));
        assert_eq!(client.token(None), Some("fallback"));
    }

    #[test]
    fn account_id_is_required() {
        let result = MetaGraphClient::new(
            Arc::new(ScriptedTransport::new()),
            GraphConfig::default(),
            ResponseCache::from_secs(60, 10),
        );
        assert!(matches!(result, Err(InsightsError::Config(_))));
    }
}
