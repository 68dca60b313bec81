use chrono::Local;
use serde_json::json;

use crate::routes::{json_response, JsonResponse};
use crate::state::AppState;

pub fn handle_root() -> JsonResponse {
    json_response(
        200,
        &json!({
            "message": "Land-cover classification API",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub fn handle_health(state: &AppState) -> JsonResponse {
    let usage = state.monitor.sample();
    let latency = state.stats.recent_latency();
    let version = state.handle.version();
    json_response(
        200,
        &json!({
            "status": if version.is_some() { "healthy" } else { "degraded" },
            "model_loaded": version.is_some(),
            "model_version": version,
            "uptime_seconds": state.stats.uptime().as_secs_f64(),
            "prediction_count": state.stats.prediction_count(),
            "avg_latency_ms": latency.avg_latency_ms,
            "cpu_percent": usage.cpu_percent,
            "memory_percent": usage.memory_percent,
            "training_status": state.orchestrator.status().status,
            "timestamp": Local::now().to_rfc3339(),
        }),
    )
}

pub fn handle_metrics(state: &AppState) -> JsonResponse {
    json_response(200, &state.stats.metrics())
}
