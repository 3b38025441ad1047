//! REST API handlers for dashboard reads, analysis and ad-set writes.

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use insights_core::config::RuleThresholds;
use insights_core::error::InsightsError;
use insights_core::goals::UserGoals;
use insights_core::types::{DateRange, RawAdRecord};
use insights_integrations::{BudgetUpdate, DeliveryStatus, MetaGraphClient, MutationOutcome, StatusUpdate};
use insights_reporting::cost_model::{CostBreakdown, RealizedSnapshot};
use insights_reporting::creatives::{rank_creatives, RankedCreative};
use insights_reporting::demographics::{merge_breakdowns, DemographicRow};
use insights_reporting::hierarchy::{AccountOverview, CampaignNode, Hierarchy};
use insights_reporting::health::HealthBuckets;
use insights_reporting::pipeline::{BucketTotals, DashboardSnapshot, InsightsPipeline};
use insights_reporting::rules::{AnalysisRequest, InsightCard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Default reporting window when the request names none.
const DEFAULT_RANGE_DAYS: u32 = 7;

/// Upper bound on `?limit=` for creative rankings.
const MAX_CREATIVES: usize = 100;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<MetaGraphClient>,
    pub pipeline: Arc<InsightsPipeline>,
    pub goals: UserGoals,
    pub rules: RuleThresholds,
    pub start_time: Instant,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

// ─── Request / response bodies ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    #[serde(default)]
    pub refresh: bool,
    pub roas_goal: Option<f64>,
    pub cpa_goal: Option<f64>,
    pub limit: Option<usize>,
}

impl ReportQuery {
    fn range(&self) -> Result<DateRange, InsightsError> {
        match (self.since, self.until) {
            (Some(since), Some(until)) => DateRange::new(since, until),
            (None, None) => Ok(DateRange::trailing(Utc::now().date_naive(), DEFAULT_RANGE_DAYS)),
            _ => Err(InsightsError::validation("since and until must be given together")),
        }
    }

    fn goals(&self, defaults: UserGoals) -> Result<UserGoals, InsightsError> {
        let goals = UserGoals {
            roas_goal: self.roas_goal.unwrap_or(defaults.roas_goal),
            cpa_goal: self.cpa_goal.unwrap_or(defaults.cpa_goal),
        };
        goals.validate()?;
        Ok(goals)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: DeliveryStatus,
}

#[derive(Debug, Deserialize)]
pub struct BudgetBody {
    /// Major currency units.
    #[serde(alias = "dailyBudget")]
    pub daily_budget: f64,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub range: DateRange,
    pub overview: AccountOverview,
    pub cost_breakdown: CostBreakdown,
}

#[derive(Serialize)]
pub struct HealthBucketsResponse {
    pub range: DateRange,
    pub cost_breakdown: CostBreakdown,
    pub buckets: HealthBuckets,
    pub totals: BucketTotals,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub backend: String,
    pub insights: Vec<InsightCard>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cached_responses: usize,
}

// ─── Error mapping ──────────────────────────────────────────────────────────

fn reject(
    status: StatusCode,
    error: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
            details,
        }),
    )
}

/// Map a domain error onto an HTTP status and body.
pub fn error_response(err: InsightsError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        InsightsError::Validation(msg) => {
            warn!(error = %msg, "Request validation failed");
            metrics::counter!("api.validation_errors").increment(1);
            reject(StatusCode::BAD_REQUEST, "validation_error", msg, None)
        }
        InsightsError::Upstream { status, payload } => {
            metrics::counter!("api.errors").increment(1);
            if status == 401 || status == 403 {
                warn!(status, "Ads platform rejected the access token");
                reject(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "The ads platform rejected the access token",
                    Some(payload),
                )
            } else {
                error!(status, payload = %payload, "Ads platform request failed");
                reject(
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    format!("The ads platform answered with HTTP {status}"),
                    Some(payload),
                )
            }
        }
        InsightsError::Transport(msg) => {
            error!(error = %msg, "Ads platform unreachable");
            metrics::counter!("api.errors").increment(1);
            reject(StatusCode::BAD_GATEWAY, "upstream_unavailable", msg, None)
        }
        InsightsError::Pagination(msg) => {
            error!(error = %msg, "Ads platform pagination failed");
            metrics::counter!("api.errors").increment(1);
            reject(StatusCode::BAD_GATEWAY, "pagination_error", msg, None)
        }
        other => {
            error!(error = %other, "Request processing failed");
            metrics::counter!("api.errors").increment(1);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error",
                None,
            )
        }
    }
}

fn unauthorized() -> (StatusCode, Json<ErrorResponse>) {
    metrics::counter!("api.errors").increment(1);
    reject(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "No access token: send an Authorization bearer header or configure graph.access_token",
        None,
    )
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
}

fn token(state: &AppState, headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    state
        .client
        .token(bearer(headers))
        .map(str::to_string)
        .ok_or_else(unauthorized)
}

async fn load_records(
    state: &AppState,
    headers: &HeaderMap,
    query: &ReportQuery,
) -> Result<(DateRange, Arc<Vec<RawAdRecord>>), (StatusCode, Json<ErrorResponse>)> {
    let range = query.range().map_err(error_response)?;
    let token = token(state, headers)?;
    let records = state
        .client
        .fetch_ads(&token, range, query.refresh)
        .await
        .map_err(error_response)?;
    Ok((range, records))
}

fn account_breakdown(state: &AppState, hierarchy: &Hierarchy) -> CostBreakdown {
    let totals = hierarchy.overview().totals;
    state
        .pipeline
        .cost_model()
        .derive(Some(&RealizedSnapshot::from(&totals)))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// GET /v1/campaigns: campaign → ad set → ad hierarchy.
pub async fn list_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Vec<CampaignNode>> {
    let (_, records) = load_records(&state, &headers, &query).await?;
    let hierarchy = state.pipeline.aggregator().aggregate(&records);
    Ok(Json(hierarchy.campaigns))
}

/// GET /v1/overview: account totals and unit economics.
pub async fn overview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<OverviewResponse> {
    let (range, records) = load_records(&state, &headers, &query).await?;
    let hierarchy = state.pipeline.aggregator().aggregate(&records);
    Ok(Json(OverviewResponse {
        range,
        cost_breakdown: account_breakdown(&state, &hierarchy),
        overview: hierarchy.overview(),
    }))
}

/// GET /v1/health-buckets: sales and lead ad sets by financial health.
pub async fn health_buckets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<HealthBucketsResponse> {
    let (range, records) = load_records(&state, &headers, &query).await?;
    let hierarchy = state.pipeline.aggregator().aggregate(&records);
    let cost_breakdown = account_breakdown(&state, &hierarchy);
    let buckets = state
        .pipeline
        .classifier()
        .classify(&hierarchy, state.pipeline.cost_model(), &cost_breakdown);
    Ok(Json(HealthBucketsResponse {
        range,
        cost_breakdown,
        totals: BucketTotals::from(&buckets),
        buckets,
    }))
}

/// GET /v1/creatives: ads ranked by realized profit.
pub async fn creatives(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Vec<RankedCreative>> {
    let (_, records) = load_records(&state, &headers, &query).await?;
    let hierarchy = state.pipeline.aggregator().aggregate(&records);
    let limit = query.limit.map(|l| l.clamp(1, MAX_CREATIVES));
    Ok(Json(rank_creatives(&hierarchy, state.pipeline.cost_model(), limit)))
}

/// GET /v1/demographics: merged age and gender breakdowns.
pub async fn demographics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Vec<DemographicRow>> {
    let range = query.range().map_err(error_response)?;
    let token = token(&state, &headers)?;
    let batches = state
        .client
        .fetch_demographics(&token, range, query.refresh)
        .await
        .map_err(error_response)?;
    Ok(Json(merge_breakdowns(state.pipeline.extractor(), &batches)))
}

/// GET /v1/dashboard: everything the dashboard renders, with insights.
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> ApiResult<DashboardSnapshot> {
    let range = query.range().map_err(error_response)?;
    let goals = query.goals(state.goals).map_err(error_response)?;
    let token = token(&state, &headers)?;

    let (records, history) = tokio::try_join!(
        state.client.fetch_ads(&token, range, query.refresh),
        state.client.fetch_history(
            &token,
            range,
            state.rules.history_window_days,
            state.pipeline.extractor(),
            query.refresh,
        ),
    )
    .map_err(error_response)?;

    state
        .pipeline
        .build(range, &records, &goals, &history)
        .map(Json)
        .map_err(error_response)
}

/// POST /v1/analyze: run the insight backend on client-supplied ad sets.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<AnalyzeResponse> {
    let insights = state.pipeline.analyze(request).map_err(error_response)?;
    Ok(Json(AnalyzeResponse {
        backend: state.pipeline.backend_name().to_string(),
        insights,
    }))
}

/// POST /v1/adsets/:id/status: pause or activate an ad set.
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(adset_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<MutationOutcome> {
    let update = StatusUpdate::new(adset_id, body.status).map_err(error_response)?;
    let token = token(&state, &headers)?;
    state
        .client
        .update_status(&token, &update)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /v1/adsets/:id/budget: set the daily budget in major units.
pub async fn update_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(adset_id): Path<String>,
    Json(body): Json<BudgetBody>,
) -> ApiResult<MutationOutcome> {
    let update = BudgetUpdate::from_major(adset_id, body.daily_budget).map_err(error_response)?;
    let token = token(&state, &headers)?;
    state
        .client
        .update_budget(&token, &update)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /health: Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cached_responses: state.client.cache().len(),
    })
}

/// GET /ready: Readiness probe. Requests may bring their own token, so
/// a missing fallback token does not make the node unready.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live: Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
