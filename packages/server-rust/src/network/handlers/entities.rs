//! Generic CRUD handlers over a [`RequestEngine`].
//!
//! Each handler decodes the request into an operation input, hands it to the
//! engine, and renders the reply (record plus hook annotations) as JSON.
//! Every success is a 200.

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rally_core::records::{AuthCredential, LoginBody};
use rally_core::{Entity, Rejection, Validate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::extract::{Caller, KeyPath, Payload, QueryFilter};
use super::ApiError;
use crate::service::engine::RequestEngine;
use crate::service::operation::{
    CreateInput, DeleteInput, ListInput, ReadInput, Reply, UpdateInput,
};
use crate::service::token::IdentityDecoder;

/// State behind one entity's routes.
pub struct EntityState<E: Entity> {
    pub engine: RequestEngine<E>,
    pub identity: Arc<IdentityDecoder>,
}

impl<E: Entity> Clone for EntityState<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            identity: Arc::clone(&self.identity),
        }
    }
}

impl<E: Entity> FromRef<EntityState<E>> for Arc<IdentityDecoder> {
    fn from_ref(state: &EntityState<E>) -> Self {
        Arc::clone(&state.identity)
    }
}

/// Path segments an entity is mounted under: `/{singular}`,
/// `/{singular}/{id}` and `/{plural}`.
#[derive(Debug, Clone, Copy)]
pub struct Mount {
    pub singular: &'static str,
    pub plural: &'static str,
}

/// Routes for a publicly readable entity:
///
/// - `POST /{singular}`: create
/// - `GET /{singular}/{id}`: read
/// - `PUT /{singular}/{id}`: update
/// - `DELETE /{singular}/{id}`: delete
/// - `GET /{plural}`: list, filtered by query string
pub fn entity_routes<E>(mount: Mount, state: EntityState<E>) -> Router
where
    E: Entity,
    E::Draft: DeserializeOwned + Validate,
    E::Patch: DeserializeOwned + Validate,
    E::Filter: DeserializeOwned,
{
    Router::new()
        .route(&format!("/{}", mount.singular), post(create::<E>))
        .route(
            &format!("/{}/{{id}}", mount.singular),
            get(read::<E>).put(update::<E>).delete(remove::<E>),
        )
        .route(&format!("/{}", mount.plural), get(list::<E>))
        .with_state(state)
}

/// Routes for credentials. Reads only happen through login, and there is
/// no listing.
///
/// - `POST /auth`: register
/// - `POST /auth/login`: verify password, issue token
/// - `PUT /auth/{email}`: change password
/// - `DELETE /auth/{email}`: remove credential
pub fn auth_routes(state: EntityState<AuthCredential>) -> Router {
    Router::new()
        .route("/auth", post(create::<AuthCredential>))
        .route("/auth/login", post(login))
        .route(
            "/auth/{email}",
            put(update::<AuthCredential>).delete(remove::<AuthCredential>),
        )
        .with_state(state)
}

fn respond<R: Serialize>(reply: Reply<R>) -> Result<Json<Value>, ApiError> {
    reply
        .into_body()
        .map(Json)
        .map_err(|err| ApiError(Rejection::internal(format!("response encoding failed: {err}"))))
}

async fn create<E>(
    State(state): State<EntityState<E>>,
    Caller(ctx): Caller,
    Payload(draft): Payload<E::Draft>,
) -> Result<Json<Value>, ApiError>
where
    E: Entity,
    E::Draft: DeserializeOwned + Validate,
{
    respond(state.engine.create(CreateInput { ctx, draft }).await?)
}

async fn read<E: Entity>(
    State(state): State<EntityState<E>>,
    Caller(ctx): Caller,
    KeyPath(key): KeyPath<E::Key>,
) -> Result<Json<Value>, ApiError> {
    let input = ReadInput {
        ctx,
        key,
        presented_secret: None,
    };
    respond(state.engine.read(input).await?)
}

async fn login(
    State(state): State<EntityState<AuthCredential>>,
    Caller(ctx): Caller,
    Payload(body): Payload<LoginBody>,
) -> Result<Json<Value>, ApiError> {
    let input = ReadInput {
        ctx,
        key: body.email,
        presented_secret: Some(body.password),
    };
    respond(state.engine.read(input).await?)
}

async fn update<E>(
    State(state): State<EntityState<E>>,
    Caller(ctx): Caller,
    KeyPath(key): KeyPath<E::Key>,
    Payload(patch): Payload<E::Patch>,
) -> Result<Json<Value>, ApiError>
where
    E: Entity,
    E::Patch: DeserializeOwned + Validate,
{
    respond(state.engine.update(UpdateInput { ctx, key, patch }).await?)
}

async fn remove<E: Entity>(
    State(state): State<EntityState<E>>,
    Caller(ctx): Caller,
    KeyPath(key): KeyPath<E::Key>,
) -> Result<Json<Value>, ApiError> {
    respond(state.engine.delete(DeleteInput { ctx, key }).await?)
}

async fn list<E>(
    State(state): State<EntityState<E>>,
    Caller(ctx): Caller,
    QueryFilter(filter): QueryFilter<E::Filter>,
) -> Result<Json<Value>, ApiError>
where
    E: Entity,
    E::Filter: DeserializeOwned,
{
    respond(state.engine.list(ListInput { ctx, filter }).await?)
}
