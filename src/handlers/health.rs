use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::state::AppState;

/// Whether the instance can take new work: a free request permit and room
/// for another session.
async fn accepting_work(state: &AppState) -> bool {
    state.limiter.metrics().available_permits > 0
        && state.sessions.len().await < state.sessions.max_sessions()
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let accepting = accepting_work(&state).await;
    let analysis = state.analysis.is_configured();
    let active_sessions = state.sessions.len().await;
    let limits = state.limiter.metrics();

    let status = match (accepting, analysis) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    let response = json!({
        "status": status,
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "accepting_work": accepting,
            "analysis": analysis
        },
        "sessions": {
            "active": active_sessions,
            "max": state.sessions.max_sessions()
        },
        "rate_limiting": {
            "capacity": limits.capacity,
            "total_requests": limits.total_requests,
            "rejected_requests": limits.rejected_requests,
            "available_permits": limits.available_permits,
            "rejection_rate": limits.rejection_rate()
        }
    });

    info!(
        status = status,
        accepting_work = accepting,
        analysis_configured = analysis,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint (for Kubernetes/Railway)
pub async fn ready_handler(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    if accepting_work(&state).await {
        info!("Readiness check passed");
        Ok(StatusCode::OK)
    } else {
        warn!("Readiness check failed - no request permits or session capacity left");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
