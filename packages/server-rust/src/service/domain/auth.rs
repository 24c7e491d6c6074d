//! Authentication service: credential registration, login, password change
//! and removal.
//!
//! Create and read (login) mint a bearer token after the store call. The
//! token is signed with the gateway-issued credential, which is obtained on
//! first use (or at init when `gateway.eager` is set) and then reused.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use rally_core::records::{normalize_email, AuthCredential, AuthDraft, AuthPatch};
use rally_core::{MonotonicClock, Rejection};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{RequireCaller, ScopeToCaller};
use crate::failure::Failure;
use crate::service::classify::classify;
use crate::service::engine::RequestEngine;
use crate::service::gateway::CredentialExchange;
use crate::service::hooks::{pre_fn, HookRegistry, PostHook};
use crate::service::operation::{
    Annotations, CreateInput, DeleteInput, KeyArgs, Keyed, ReadInput, UpdateArgs, UpdateInput,
};
use crate::service::password::{hash_password, verify_password};
use crate::service::registry::{ManagedService, ServiceContext};
use crate::service::token::TokenMinter;
use crate::storage::Store;

/// Response field carrying the minted token.
pub const TOKEN_FIELD: &str = "token";

const BAD_LOGIN: &str = "invalid email or password";

pub struct AuthService {
    engine: RequestEngine<AuthCredential>,
    exchange: Arc<CredentialExchange>,
    eager: bool,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store<AuthCredential>>,
        exchange: Arc<CredentialExchange>,
        minter: TokenMinter,
        clock: Arc<MonotonicClock>,
        eager: bool,
    ) -> Self {
        let hooks = hooks(Arc::clone(&exchange), minter, clock);
        Self {
            engine: RequestEngine::new(store, hooks),
            exchange,
            eager,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &RequestEngine<AuthCredential> {
        &self.engine
    }
}

#[async_trait]
impl ManagedService for AuthService {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        if self.eager {
            self.exchange
                .credential()
                .await
                .context("initial gateway credential exchange")?;
        }
        info!(
            service = "auth",
            hooks = ?self.engine.hooks().counts(),
            credential_ready = self.exchange.is_ready(),
            "auth service ready"
        );
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(service = "auth", "auth service stopped");
        Ok(())
    }
}

/// Assembles the auth hook set.
#[must_use]
pub fn hooks(
    exchange: Arc<CredentialExchange>,
    minter: TokenMinter,
    clock: Arc<MonotonicClock>,
) -> Arc<HookRegistry<AuthCredential>> {
    let issue = IssueToken { exchange, minter };
    let create_clock = Arc::clone(&clock);

    HookRegistry::builder()
        .pre_create(pre_fn(
            "normalize-email",
            |_: &CreateInput<AuthCredential>, draft: &mut AuthDraft| {
                draft.email = normalize_email(&draft.email);
                Ok(())
            },
        ))
        .pre_create(pre_fn(
            "hash-password",
            |_: &CreateInput<AuthCredential>, draft: &mut AuthDraft| {
                let hashed = hash_password(&draft.password).map_err(|e| classify(&e))?;
                draft.password_hash = Some(hashed);
                draft.password.clear();
                Ok(())
            },
        ))
        .pre_create(pre_fn(
            "stamp-identity",
            move |_: &CreateInput<AuthCredential>, draft: &mut AuthDraft| {
                let now = create_clock.now();
                draft.id = Uuid::new_v4();
                draft.created_at = now;
                draft.updated_at = now;
                Ok(())
            },
        ))
        .post_create(issue.clone())
        .pre_read(pre_fn(
            "normalize-email",
            normalize_key::<ReadInput<AuthCredential>, KeyArgs<String>>,
        ))
        .post_read(VerifyPassword)
        .post_read(issue)
        .pre_update(RequireCaller)
        .pre_update(ScopeToCaller)
        .pre_update(pre_fn(
            "normalize-email",
            normalize_key::<UpdateInput<AuthCredential>, UpdateArgs<String, AuthPatch>>,
        ))
        .pre_update(pre_fn(
            "hash-password",
            move |_: &UpdateInput<AuthCredential>, args: &mut UpdateArgs<String, AuthPatch>| {
                let hashed = hash_password(&args.patch.password).map_err(|e| classify(&e))?;
                args.patch.password_hash = Some(hashed);
                args.patch.password.clear();
                args.patch.updated_at = clock.now();
                Ok(())
            },
        ))
        .pre_delete(RequireCaller)
        .pre_delete(ScopeToCaller)
        .pre_delete(pre_fn(
            "normalize-email",
            normalize_key::<DeleteInput<AuthCredential>, KeyArgs<String>>,
        ))
        .build()
}

#[allow(clippy::unnecessary_wraps)]
fn normalize_key<I, S: Keyed<String>>(_input: &I, staged: &mut S) -> Result<(), Rejection> {
    let key = staged.key_mut();
    *key = normalize_email(key);
    Ok(())
}

/// Checks the presented password against the stored hash. A missing
/// password counts as a wrong one.
#[derive(Debug, Clone, Copy)]
struct VerifyPassword;

#[async_trait]
impl PostHook<ReadInput<AuthCredential>, AuthCredential> for VerifyPassword {
    fn name(&self) -> &str {
        "verify-password"
    }

    async fn run(
        &self,
        input: &ReadInput<AuthCredential>,
        credential: &AuthCredential,
        _annotations: &mut Annotations,
    ) -> Result<(), Rejection> {
        let presented = input.presented_secret.as_deref().unwrap_or_default();
        if verify_password(presented, &credential.password_hash) {
            Ok(())
        } else {
            Err(Rejection::unauthorized(BAD_LOGIN))
        }
    }
}

/// Mints a token bound to the credential's subject id and adds it to the
/// response.
#[derive(Clone)]
struct IssueToken {
    exchange: Arc<CredentialExchange>,
    minter: TokenMinter,
}

#[async_trait]
impl<I: Sync> PostHook<I, AuthCredential> for IssueToken {
    fn name(&self) -> &str {
        "issue-token"
    }

    async fn run(
        &self,
        _input: &I,
        credential: &AuthCredential,
        annotations: &mut Annotations,
    ) -> Result<(), Rejection> {
        let signing = self
            .exchange
            .credential()
            .await
            .map_err(|err| classify(&Failure::from(err)))?;
        let token = self
            .minter
            .mint(&signing, &credential.id.to_string(), Some(&credential.email))
            .map_err(|failure| classify(&failure))?;
        annotations.insert(TOKEN_FIELD.to_string(), Value::String(token));
        Ok(())
    }
}
