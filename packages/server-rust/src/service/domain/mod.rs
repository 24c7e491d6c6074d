//! Domain services: one per record family, each owning a store, a frozen hook
//! registry and the engine that ties them together.
//!
//! Hooks shared across families live here; family-specific ones live in the
//! submodules.

pub mod auth;
pub mod matches;
pub mod users;

use async_trait::async_trait;
use rally_core::{Principal, Rejection, RequestContext};
use uuid::Uuid;

use super::hooks::PreHook;
use super::operation::{HasContext, Scoped};

pub use auth::AuthService;
pub use matches::{LocalDirectory, MatchService, PeerDirectory, PlayerDirectory};
pub use users::UserService;

/// Returns the authenticated caller or a 401 rejection.
///
/// # Errors
///
/// Rejects with `Unauthorized` when the request carried no identity.
pub fn caller(ctx: &RequestContext) -> Result<&Principal, Rejection> {
    ctx.principal
        .as_ref()
        .ok_or_else(|| Rejection::unauthorized("authentication required"))
}

/// The caller's subject id as a UUID.
///
/// # Errors
///
/// Rejects with `Unauthorized` when there is no caller or the subject is not
/// a UUID.
pub fn caller_subject(ctx: &RequestContext) -> Result<Uuid, Rejection> {
    let principal = caller(ctx)?;
    Uuid::parse_str(&principal.id)
        .map_err(|_| Rejection::unauthorized("token subject is not a valid id"))
}

/// Rejects anonymous callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireCaller;

#[async_trait]
impl<I, S> PreHook<I, S> for RequireCaller
where
    I: HasContext + Sync,
    S: Send,
{
    fn name(&self) -> &str {
        "require-caller"
    }

    async fn run(&self, input: &I, _staged: &mut S) -> Result<(), Rejection> {
        caller(input.ctx()).map(|_| ())
    }
}

/// Restricts the store call to records owned by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeToCaller;

#[async_trait]
impl<I, S> PreHook<I, S> for ScopeToCaller
where
    I: HasContext + Sync,
    S: Scoped + Send,
{
    fn name(&self) -> &str {
        "scope-to-caller"
    }

    async fn run(&self, input: &I, staged: &mut S) -> Result<(), Rejection> {
        let principal = caller(input.ctx())?;
        staged.scope_mut().owner = Some(principal.id.clone());
        Ok(())
    }
}
