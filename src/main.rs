use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod audit;
mod cache;
mod cli;
mod config;
mod errors;
mod jobs;
mod metrics;
mod models;
mod pricing;
mod quote;
mod rates;
mod resolve;

use cache::{TierSettings, TieredCache};
use quote::QuoteService;
use rates::loader::{RatesLoader, RatesSource};
use rates::RateTableHandle;
use resolve::geocode::{CentroidLookup, GeocodeStrategy};
use resolve::providers::{OpenGeocoder, PrimaryGeocoder, RoutingProvider};
use resolve::{DistanceResolver, GeocodeResolver};

/// Shared application state passed to handlers.
pub struct AppState {
    pub service: QuoteService,
    pub rates: RateTableHandle,
    pub loader: Arc<RatesLoader>,
    pub cache: Arc<TieredCache>,
    pub config: config::Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "haulquote"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .expect("failed to install OpenTelemetry tracer");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "haulquote=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Rates { command }) => match command {
            cli::RatesCommands::Validate { file } => validate_rates(file).await,
        },
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Load and validate a rate-table export, printing a summary.
async fn validate_rates(file: String) -> anyhow::Result<()> {
    let loader = RatesLoader::new(RatesSource::File(PathBuf::from(&file)));
    let table = loader.load().await?;
    println!("rate table OK");
    println!("  version:        {}", table.version);
    println!("  effective:      {}", table.effective_date);
    println!("  trailer types:  {}", table.trailer_rates.len());
    println!("  usage types:    {}", table.usage_multipliers.len());
    println!("  extras:         {}", table.extras_catalog.len());
    println!("  zones:          {}", table.delivery_zones.len());
    println!("  branches:       {}", table.branches.len());
    println!("  discount rules: {}", table.discount_rules.len());
    Ok(())
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Loading rate table...");
    let loader = Arc::new(RatesLoader::from_config(&cfg)?);
    // No table means no prices; refusing to start beats serving errors.
    let initial = loader.load().await?;
    tracing::info!(version = %initial.version, "rate table loaded");
    let rates = RateTableHandle::new(initial);

    let redis = match &cfg.redis_url {
        Some(url) => match redis::Client::open(url.as_str()) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("Redis connected");
                    Some(conn)
                }
                Err(e) => {
                    tracing::warn!("Redis unavailable, caching locally only: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Redis URL invalid, caching locally only: {}", e);
                None
            }
        },
        None => None,
    };

    let tier = |secs: u64| TierSettings {
        ttl: std::time::Duration::from_secs(secs),
        capacity: cfg.cache_tier_capacity,
    };
    let cache = Arc::new(TieredCache::new(
        redis,
        [
            tier(cfg.geocode_ttl_secs),
            tier(cfg.distance_ttl_secs),
            tier(cfg.zone_ttl_secs),
            tier(cfg.quote_ttl_secs),
        ],
    ));

    let chain: Vec<Arc<dyn GeocodeStrategy>> = vec![
        Arc::new(PrimaryGeocoder::new(
            cfg.geocode_primary_url.clone(),
            cfg.geocode_primary_api_key.clone(),
            cfg.provider_timeout_ms,
        )),
        Arc::new(OpenGeocoder::new(
            cfg.geocode_fallback_url.clone(),
            cfg.provider_timeout_ms,
        )),
        Arc::new(CentroidLookup),
    ];
    let geocoder = GeocodeResolver::new(cache.clone(), chain);
    let distance = DistanceResolver::new(
        cache.clone(),
        Some(RoutingProvider::new(
            cfg.routing_url.clone(),
            cfg.provider_timeout_ms,
        )),
    );
    let audit = audit::AuditSink::new(
        cfg.audit_webhook_urls.clone(),
        cfg.audit_webhook_secret.clone(),
    );

    let service = QuoteService::new(
        cache.clone(),
        rates.clone(),
        geocoder,
        distance,
        audit,
        cfg.max_address_len,
    );

    let state = Arc::new(AppState {
        service,
        rates: rates.clone(),
        loader: loader.clone(),
        cache: cache.clone(),
        config: cfg.clone(),
    });

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        .route("/metrics", axum::routing::get(|| async { metrics::render() }))
        .nest("/api/v1", api::api_router())
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_id_middleware));

    jobs::rates_refresh::spawn(loader, rates, cfg.rates_refresh_secs);
    jobs::cache_sweep::spawn(cache);
    tracing::info!("Background jobs started (rates refresh, cache sweep)");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HaulQuote listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so
/// clients can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<&'static str, axum::http::StatusCode> {
    // Ready once a rate table is loaded; it always is after startup.
    if state.rates.version().await.is_empty() {
        return Err(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok("ok")
}
