use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_ledger::config::AppConfig;
use audit_ledger::service::AuditService;
use audit_ledger::store::AuditStore;

struct AppState {
    config: AppConfig,
    service: AuditService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audit_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audit ledger service");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let store = AuditStore::new(&config.database_url).await?;
    info!("Database connected");

    store.run_migrations().await?;
    info!("Database migrations completed");

    let service = AuditService::from_config(&config, store);
    let state = Arc::new(AppState {
        config: config.clone(),
        service,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .route("/events", post(log_event))
        .route("/integrity", get(verify_all))
        .route("/integrity/:tenant_id", get(verify_tenant))
        .route("/metrics", get(metrics_snapshot))
        .route("/chain/:tenant_id", get(chain_page))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
        .with_state(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct LogEventRequest {
    tenant_id: String,
    user_id: Option<String>,
    service_name: Option<String>,
    event_type: Option<String>,
    payload: Value,
}

async fn log_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LogEventRequest>,
) -> (StatusCode, Json<audit_ledger::LogEventOutcome>) {
    let outcome = state
        .service
        .log_event(
            request.payload,
            &request.tenant_id,
            request.user_id,
            request.service_name,
            request.event_type,
        )
        .await;

    let status = if outcome.success {
        StatusCode::CREATED
    } else {
        match outcome.error_code.as_deref() {
            Some("compliance_rejected") => StatusCode::UNPROCESSABLE_ENTITY,
            Some("storage_timeout") => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    (status, Json(outcome))
}

async fn verify_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<audit_ledger::IntegrityReport>, (StatusCode, Json<Value>)> {
    verify(&state, None).await
}

async fn verify_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> Result<Json<audit_ledger::IntegrityReport>, (StatusCode, Json<Value>)> {
    verify(&state, Some(tenant_id.as_str())).await
}

async fn verify(
    state: &AppState,
    tenant_id: Option<&str>,
) -> Result<Json<audit_ledger::IntegrityReport>, (StatusCode, Json<Value>)> {
    state
        .service
        .verify_integrity(tenant_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn metrics_snapshot(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!(state.service.metrics()))
}

#[derive(Debug, Deserialize)]
struct ChainPageParams {
    from: Option<i64>,
    limit: Option<i64>,
}

async fn chain_page(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Query(params): Query<ChainPageParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let from = params.from.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(100);

    let records = state
        .service
        .chain_page(&tenant_id, from, limit)
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({
        "tenant_id": tenant_id,
        "from_sequence": from,
        "records": records,
    })))
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

async fn status_endpoint(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (cache_hits, cache_misses) = state.service.cache_counts();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "audit-ledger",
        "timestamp": chrono::Utc::now(),
        "database_url": state.config.database_url,
        "metrics": state.service.metrics(),
        "cache": {
            "hits": cache_hits,
            "misses": cache_misses,
        }
    }))
}

fn error_response(err: audit_ledger::LedgerError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        audit_ledger::LedgerError::StorageTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "code": err.code(),
        })),
    )
}
