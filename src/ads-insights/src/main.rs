//! Ads Insights: marketing analytics service over the Graph API.
//!
//! Main entry point that wires the Graph API client, the reporting pipeline
//! and the REST server.

use clap::Parser;
use insights_api::ApiServer;
use insights_cache::ResponseCache;
use insights_core::config::AppConfig;
use insights_integrations::{MetaGraphClient, ReqwestTransport};
use insights_reporting::InsightsPipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "ads-insights")]
#[command(about = "Ad account analytics: hierarchy, unit economics, health tiers and recommendations")]
#[command(version)]
struct Cli {
    /// HTTP port (overrides config)
    #[arg(long, env = "ADS_INSIGHTS__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "ADS_INSIGHTS__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Ad account id, with or without the `act_` prefix (overrides config)
    #[arg(long, env = "ADS_INSIGHTS__GRAPH__AD_ACCOUNT_ID")]
    ad_account_id: Option<String>,

    /// Read cache TTL in seconds (overrides config)
    #[arg(long, env = "ADS_INSIGHTS__CACHE__TTL_SECS")]
    cache_ttl_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ads_insights=info,insights_integrations=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Ads Insights starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if let Some(account) = cli.ad_account_id {
        config.graph.ad_account_id = account;
    }
    if let Some(ttl) = cli.cache_ttl_secs {
        config.cache.ttl_secs = ttl;
    }

    config.validate()?;

    info!(
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        api_version = %config.graph.api_version,
        cache_ttl_secs = config.cache.ttl_secs,
        fallback_token = config.graph.access_token.is_some(),
        "Configuration loaded"
    );

    // Graph API client with its read cache
    let transport = ReqwestTransport::new(Duration::from_secs(config.graph.request_timeout_secs))?;
    let cache = ResponseCache::from_secs(config.cache.ttl_secs, config.cache.max_entries);
    let client = Arc::new(MetaGraphClient::new(
        Arc::new(transport),
        config.graph.clone(),
        cache.clone(),
    )?);

    let pipeline = Arc::new(InsightsPipeline::from_config(&config));
    info!(backend = pipeline.backend_name(), "Reporting pipeline ready");

    let api_server = ApiServer::new(config.clone(), client, pipeline);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn cache maintenance task
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = cache.evict_expired();
            if evicted > 0 {
                debug!(evicted, "Evicted expired cache entries");
            }
        }
    });

    info!("Ads Insights is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
