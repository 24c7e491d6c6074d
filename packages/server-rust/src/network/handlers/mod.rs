//! HTTP handler definitions for the Rally server.
//!
//! This module defines `AppState` (the state behind the health routes),
//! [`ApiError`] (the response form of every [`Rejection`]), and re-exports
//! the handler functions used when building the router.

pub mod entities;
pub mod extract;
pub mod health;

pub use entities::{auth_routes, entity_routes, EntityState, Mount};
pub use extract::{Caller, KeyPath, Payload, QueryFilter};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rally_core::Rejection;

use super::ShutdownController;

/// Shared state for the health routes.
#[derive(Clone)]
pub struct AppState {
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
    /// Names of the services hosted by this process.
    pub services: Arc<[&'static str]>,
}

/// A [`Rejection`] on its way to the wire: its status code and a
/// `{"error": message}` body.
#[derive(Debug)]
pub struct ApiError(pub Rejection);

impl ApiError {
    /// Renders the rejection body under a status other than its kind's.
    #[must_use]
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self.0)).into_response()
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.with_status(status)
    }
}
