//! User profile service. One profile per auth subject; only the owner may
//! change or remove it. Reads and listing are public.

use std::sync::Arc;

use async_trait::async_trait;
use rally_core::records::{UserDraft, UserPatch, UserProfile};
use rally_core::MonotonicClock;
use tracing::info;

use super::{caller_subject, RequireCaller, ScopeToCaller};
use crate::service::engine::RequestEngine;
use crate::service::hooks::{pre_fn, HookRegistry};
use crate::service::operation::{CreateInput, UpdateArgs, UpdateInput};
use crate::service::registry::{ManagedService, ServiceContext};
use crate::storage::Store;

pub struct UserService {
    engine: RequestEngine<UserProfile>,
}

impl UserService {
    #[must_use]
    pub fn new(store: Arc<dyn Store<UserProfile>>, clock: Arc<MonotonicClock>) -> Self {
        Self {
            engine: RequestEngine::new(store, hooks(clock)),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &RequestEngine<UserProfile> {
        &self.engine
    }
}

#[async_trait]
impl ManagedService for UserService {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(service = "users", hooks = ?self.engine.hooks().counts(), "users service ready");
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(service = "users", "users service stopped");
        Ok(())
    }
}

/// Assembles the user profile hook set.
#[must_use]
pub fn hooks(clock: Arc<MonotonicClock>) -> Arc<HookRegistry<UserProfile>> {
    let create_clock = Arc::clone(&clock);

    HookRegistry::builder()
        .pre_create(RequireCaller)
        .pre_create(pre_fn(
            "stamp-owner",
            move |input: &CreateInput<UserProfile>, draft: &mut UserDraft| {
                draft.auth_id = caller_subject(&input.ctx)?;
                let now = create_clock.now();
                draft.created_at = now;
                draft.updated_at = now;
                Ok(())
            },
        ))
        .pre_update(RequireCaller)
        .pre_update(ScopeToCaller)
        .pre_update(pre_fn(
            "stamp-updated",
            move |_: &UpdateInput<UserProfile>, args: &mut UpdateArgs<i64, UserPatch>| {
                args.patch.updated_at = clock.now();
                Ok(())
            },
        ))
        .pre_delete(RequireCaller)
        .pre_delete(ScopeToCaller)
        .build()
}
