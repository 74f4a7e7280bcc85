use axum::{extract::State, response::Json};
use cardhub_database::postgres_health_check;
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "cardhub-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let mut health_status = json!({
        "status": "healthy",
        "service": "cardhub-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    // Check PostgreSQL
    let postgres_status = match postgres_health_check(&state.pool).await {
        Ok(_) => json!({"status": "healthy", "message": "Connected"}),
        Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
    };
    health_status["checks"]["postgres"] = postgres_status;

    // Check upload directory
    let storage_status = match tokio::fs::metadata(state.storage.root()).await {
        Ok(meta) if meta.is_dir() => json!({"status": "healthy", "message": "Available"}),
        Ok(_) => json!({"status": "unhealthy", "message": "Upload path is not a directory"}),
        Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
    };
    health_status["checks"]["storage"] = storage_status;

    // Determine overall status
    let all_healthy = health_status["checks"]
        .as_object()
        .map(|checks| checks.values().all(|check| check["status"] == "healthy"))
        .unwrap_or(false);

    if !all_healthy {
        health_status["status"] = json!("degraded");
    }

    Json(health_status)
}

pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
