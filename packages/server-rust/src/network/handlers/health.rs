//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Returns detailed health information as JSON.
///
/// Always returns 200; the `state` field tells "up but draining" apart from
/// "ready".
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "services": &*state.services,
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe. Always 200 while the process answers.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 when ready, 503 while starting, draining, or stopped.
/// The body names the current state.
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let health = state.shutdown.health_state();
    let status = if health == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "state": health.as_str() })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::network::ShutdownController;

    fn test_state() -> AppState {
        AppState {
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
            services: Arc::from(vec!["auth", "users"]),
        }
    }

    #[tokio::test]
    async fn health_reports_state_and_services() {
        let state = test_state();
        state.shutdown.set_ready();
        let _guard = state.shutdown.in_flight_guard();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["services"], json!(["auth", "users"]));
        assert_eq!(json["in_flight"], 1);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_reports_draining() {
        let state = test_state();
        state.shutdown.set_ready();
        state.shutdown.trigger_shutdown();
        assert_eq!(health_handler(State(state)).await.0["state"], "draining");
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await.0,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        let (status, body) = readiness_handler(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0["state"], "ready");

        state.shutdown.trigger_shutdown();
        let (status, body) = readiness_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.0["state"], "draining");
    }
}
