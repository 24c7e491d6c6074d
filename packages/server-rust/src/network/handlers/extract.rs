//! Request extractors shared by the entity handlers.
//!
//! Every extractor rejects with an [`ApiError`], so malformed input reaches
//! the caller in the same `{"error": ...}` shape as engine rejections.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use rally_core::{RecordKey, Rejection, RequestContext, Validate};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ApiError;
use crate::network::middleware::REQUEST_ID_HEADER;
use crate::service::classify::classify;
use crate::service::token::IdentityDecoder;

/// Caller context: the request id plus the principal decoded from a bearer
/// token.
///
/// No `Authorization` header means an anonymous caller. A header that is
/// present but not a decodable bearer token is rejected with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl<S> FromRequestParts<S> for Caller
where
    Arc<IdentityDecoder>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(RequestContext::anonymous(request_id)));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError(Rejection::unauthorized("malformed authorization header")))?;

        let decoder = Arc::<IdentityDecoder>::from_ref(state);
        let principal = decoder.decode(token).map_err(|failure| {
            debug!(request_id = %request_id, %failure, "bearer token rejected");
            ApiError(classify(&failure))
        })?;
        Ok(Self(RequestContext::authenticated(request_id, principal)))
    }
}

/// JSON body that has been decoded and then validated.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError(Rejection::bad_request(rejection.body_text())))?;
        if let Some(message) = value.validate().message() {
            return Err(ApiError(Rejection::bad_request(message)));
        }
        Ok(Self(value))
    }
}

/// Query-string list filter.
#[derive(Debug)]
pub struct QueryFilter<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryFilter<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(filter) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError(Rejection::bad_request(rejection.body_text())))?;
        Ok(Self(filter))
    }
}

/// Record key taken from the single path parameter.
#[derive(Debug)]
pub struct KeyPath<K>(pub K);

impl<S, K> FromRequestParts<S> for KeyPath<K>
where
    K: RecordKey,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError(Rejection::bad_request(rejection.body_text())))?;
        K::parse_key(&raw)
            .map(Self)
            .ok_or_else(|| ApiError(Rejection::bad_request(format!("invalid key: {raw}"))))
    }
}
