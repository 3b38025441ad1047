//! API server: HTTP routes plus the Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use insights_core::config::AppConfig;
use insights_integrations::MetaGraphClient;
use insights_reporting::pipeline::InsightsPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, client: Arc<MetaGraphClient>, pipeline: Arc<InsightsPipeline>) -> Self {
        let state = AppState {
            client,
            pipeline,
            goals: config.goals,
            rules: config.rules.clone(),
            start_time: Instant::now(),
        };
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Reads
        .route("/v1/campaigns", get(rest::list_campaigns))
        .route("/v1/overview", get(rest::overview))
        .route("/v1/health-buckets", get(rest::health_buckets))
        .route("/v1/creatives", get(rest::creatives))
        .route("/v1/demographics", get(rest::demographics))
        .route("/v1/dashboard", get(rest::dashboard))
        // Analysis
        .route("/v1/analyze", post(rest::analyze))
        // Writes
        .route("/v1/adsets/:id/status", post(rest::update_status))
        .route("/v1/adsets/:id/budget", post(rest::update_budget))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use insights_cache::ResponseCache;
    use insights_core::config::GraphConfig;
    use insights_core::error::{InsightsError, InsightsResult};
    use insights_integrations::GraphTransport;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use url::Url;

    /// Serves one ad for any GET, acknowledges any POST, and fails with
    /// the given status when asked to.
    struct FakeGraph {
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl GraphTransport for FakeGraph {
        async fn get(&self, _url: &Url, _token: &str) -> InsightsResult<Value> {
            if let Some(status) = self.fail_with {
                return Err(InsightsError::Upstream {
                    status,
                    payload: json!({"error": {"message": "denied", "code": 190}}),
                });
            }
            Ok(json!({"data": [{
                "id": "ad1",
                "name": "Ad 1",
                "campaign": {"id": "c1", "name": "Sales", "objective": "OUTCOME_SALES"},
                "adset": {"id": "s1", "name": "Winners", "daily_budget": "3000"},
                "insights": {"data": [{
                    "spend": "100",
                    "actions": [{"action_type": "purchase", "value": "10"}],
                    "action_values": [{"action_type": "purchase", "value": "700"}]
                }]}
            }]}))
        }

        async fn post(&self, _url: &Url, _token: &str, _form: &[(String, String)]) -> InsightsResult<Value> {
            Ok(json!({"success": true}))
        }
    }

    fn app(token: Option<&str>, fail_with: Option<u16>) -> Router {
        let config = AppConfig::default();
        let graph = GraphConfig {
            ad_account_id: "42".to_string(),
            access_token: token.map(str::to_string),
            ..Default::default()
        };
        let client = MetaGraphClient::new(
            Arc::new(FakeGraph { fail_with }),
            graph,
            ResponseCache::from_secs(60, 10),
        )
        .unwrap();
        let pipeline = InsightsPipeline::from_config(&config);
        ApiServer::new(config, Arc::new(client), Arc::new(pipeline)).router()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", "Bearer header-token")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn analyze_returns_sorted_cards() {
        let body = json!({
            "userGoals": {"roasGoal": 6, "cpaGoal": 30},
            "adsetsData": [
                {"name": "Burner", "objective": "OUTCOME_SALES", "spend": 200, "revenue": 50, "roas": 0.25},
                {"name": "Winners", "objective": "OUTCOME_SALES", "spend": 100, "revenue": 700,
                 "purchases": 10, "roas": 7, "cpa": 10}
            ]
        });
        let (status, value) = send(app(None, None), post_json("/v1/analyze", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["backend"], "rules");
        let cards = value["insights"].as_array().unwrap();
        assert_eq!(cards[0]["priority"], "CRITICAL");
        assert!(cards.iter().any(|c| c["rule"] == "scale_opportunity"));
    }

    #[tokio::test]
    async fn analyze_rejects_missing_goals() {
        let body = json!({"adsetsData": [{"name": "A"}]});
        let (status, value) = send(app(None, None), post_json("/v1/analyze", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], "validation_error");
    }

    #[tokio::test]
    async fn reads_without_any_token_are_unauthorized() {
        let (status, value) = send(app(None, None), get("/v1/campaigns")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value["error"], "unauthorized");
    }

    #[tokio::test]
    async fn campaigns_use_configured_token() {
        let (status, value) =
            send(app(Some("configured"), None), get("/v1/campaigns?since=2024-05-01&until=2024-05-07")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value[0]["name"], "Sales");
        assert_eq!(value[0]["adsets"][0]["daily_budget"], 30.0);
    }

    #[tokio::test]
    async fn half_open_range_is_rejected() {
        let (status, _) = send(app(Some("t"), None), get("/v1/overview?since=2024-05-01")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            send(app(Some("t"), None), get("/v1/overview?since=2024-05-09&until=2024-05-01")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expired_platform_token_maps_to_401_with_details() {
        let (status, value) = send(app(Some("t"), Some(401)), get("/v1/overview")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(value["details"]["error"]["code"], 190);
    }

    #[tokio::test]
    async fn other_platform_failures_map_to_502() {
        let (status, value) = send(app(Some("t"), Some(500)), get("/v1/health-buckets")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(value["error"], "upstream_error");
    }

    #[tokio::test]
    async fn budget_updates_validate_amount() {
        let (status, _) = send(
            app(None, None),
            post_json("/v1/adsets/123/budget", json!({"dailyBudget": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, value) = send(
            app(None, None),
            post_json("/v1/adsets/123/budget", json!({"daily_budget": 45.5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], true);
    }

    #[tokio::test]
    async fn status_updates_accept_wire_values() {
        let (status, value) = send(
            app(None, None),
            post_json("/v1/adsets/123/status", json!({"status": "PAUSED"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["entity_id"], "123");
    }

    #[tokio::test]
    async fn probes_respond() {
        let (status, value) = send(app(None, None), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "healthy");
        let (status, _) = send(app(None, None), get("/live")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
