//! Match record service.
//!
//! Matches are owned by the subject that recorded them. When a
//! [`PlayerDirectory`] is configured, every listed player must exist in the
//! users service before the match is stored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rally_core::records::{MatchDraft, MatchPatch, MatchRecord, UserProfile};
use rally_core::{MonotonicClock, Rejection};
use reqwest::StatusCode;
use tracing::info;
use uuid::Uuid;

use super::{caller_subject, RequireCaller, ScopeToCaller};
use crate::failure::Failure;
use crate::service::classify::classify;
use crate::service::engine::RequestEngine;
use crate::service::hooks::{pre_fn, HookRegistry, PreHook};
use crate::service::operation::{CreateInput, UpdateArgs, UpdateInput};
use crate::service::registry::{ManagedService, ServiceContext};
use crate::storage::Store;

// ---------------------------------------------------------------------------
// Player lookup
// ---------------------------------------------------------------------------

/// Answers whether a user profile id exists.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn exists(&self, user_id: i64) -> Result<bool, Failure>;
}

/// Looks players up in a users store hosted by this process.
pub struct LocalDirectory {
    users: Arc<dyn Store<UserProfile>>,
}

impl LocalDirectory {
    #[must_use]
    pub fn new(users: Arc<dyn Store<UserProfile>>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl PlayerDirectory for LocalDirectory {
    async fn exists(&self, user_id: i64) -> Result<bool, Failure> {
        match self.users.read(&user_id).await {
            Ok(_) => Ok(true),
            Err(Failure::NotFound { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

/// Looks players up through the users service's HTTP surface.
pub struct PeerDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl PeerDirectory {
    /// # Errors
    ///
    /// Returns [`Failure::Other`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Failure> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("cannot build users client: {err}"))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PlayerDirectory for PeerDirectory {
    async fn exists(&self, user_id: i64) -> Result<bool, Failure> {
        let response = self
            .http
            .get(format!("{}/user/{user_id}", self.base_url))
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("users lookup for {user_id} failed: {err}"))?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.map_err(|err| {
                    anyhow::anyhow!("users lookup for {user_id} answered {status}, body unreadable: {err}")
                })?;
                Err(anyhow::anyhow!("users lookup for {user_id} answered {status}: {body}").into())
            }
        }
    }
}

/// Rejects drafts that list players unknown to the directory.
struct VerifyPlayers {
    directory: Arc<dyn PlayerDirectory>,
}

#[async_trait]
impl PreHook<CreateInput<MatchRecord>, MatchDraft> for VerifyPlayers {
    fn name(&self) -> &str {
        "verify-players"
    }

    async fn run(
        &self,
        _input: &CreateInput<MatchRecord>,
        draft: &mut MatchDraft,
    ) -> Result<(), Rejection> {
        for player in &draft.players {
            let known = self
                .directory
                .exists(*player)
                .await
                .map_err(|failure| classify(&failure))?;
            if !known {
                return Err(Rejection::bad_request(format!("player {player} does not exist")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct MatchService {
    engine: RequestEngine<MatchRecord>,
}

impl MatchService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store<MatchRecord>>,
        clock: Arc<MonotonicClock>,
        directory: Option<Arc<dyn PlayerDirectory>>,
    ) -> Self {
        Self {
            engine: RequestEngine::new(store, hooks(clock, directory)),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &RequestEngine<MatchRecord> {
        &self.engine
    }
}

#[async_trait]
impl ManagedService for MatchService {
    fn name(&self) -> &'static str {
        "matches"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(service = "matches", hooks = ?self.engine.hooks().counts(), "matches service ready");
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(service = "matches", "matches service stopped");
        Ok(())
    }
}

/// Assembles the match hook set.
#[must_use]
pub fn hooks(
    clock: Arc<MonotonicClock>,
    directory: Option<Arc<dyn PlayerDirectory>>,
) -> Arc<HookRegistry<MatchRecord>> {
    let create_clock = Arc::clone(&clock);

    let mut builder = HookRegistry::builder()
        .pre_create(RequireCaller)
        .pre_create(pre_fn(
            "stamp-identity",
            move |input: &CreateInput<MatchRecord>, draft: &mut MatchDraft| {
                draft.owner_id = caller_subject(&input.ctx)?;
                draft.id = Some(Uuid::new_v4());
                let now = create_clock.now();
                draft.created_at = now;
                draft.updated_at = now;
                Ok(())
            },
        ));
    if let Some(directory) = directory {
        builder = builder.pre_create(VerifyPlayers { directory });
    }

    builder
        .pre_update(RequireCaller)
        .pre_update(ScopeToCaller)
        .pre_update(pre_fn(
            "stamp-updated",
            move |_: &UpdateInput<MatchRecord>, args: &mut UpdateArgs<Uuid, MatchPatch>| {
                args.patch.updated_at = clock.now();
                Ok(())
            },
        ))
        .pre_delete(RequireCaller)
        .pre_delete(ScopeToCaller)
        .build()
}

#[cfg(test)]
mod tests {
    use rally_core::records::{MatchStatus, UserDraft};
    use rally_core::{Principal, RequestContext};

    use super::*;
    use crate::service::operation::ReadInput;
    use crate::storage::MemoryStore;

    fn as_subject(id: Uuid) -> RequestContext {
        RequestContext::authenticated("r", Principal::new(id.to_string()))
    }

    fn create(ctx: RequestContext, players: Vec<i64>) -> CreateInput<MatchRecord> {
        CreateInput {
            ctx,
            draft: MatchDraft {
                title: "Friday finals".to_string(),
                players,
                ..MatchDraft::default()
            },
        }
    }

    async fn users_with(count: u128) -> Arc<dyn Store<UserProfile>> {
        let store = Arc::new(MemoryStore::<UserProfile>::new());
        for owner in 1..=count {
            store
                .create(UserDraft {
                    display_name: format!("player {owner}"),
                    auth_id: Uuid::from_u128(owner),
                    ..UserDraft::default()
                })
                .await
                .unwrap();
        }
        store
    }

    fn service(directory: Option<Arc<dyn PlayerDirectory>>) -> MatchService {
        MatchService::new(
            Arc::new(MemoryStore::<MatchRecord>::new()),
            Arc::new(MonotonicClock::system()),
            directory,
        )
    }

    #[tokio::test]
    async fn create_stamps_uuid_and_owner() {
        let owner = Uuid::new_v4();
        let reply = service(None)
            .engine()
            .create(create(as_subject(owner), vec![1, 2]))
            .await
            .unwrap();
        assert_eq!(reply.data.owner_id, owner);
        assert_ne!(reply.data.id, Uuid::nil());
        assert_eq!(reply.data.status, MatchStatus::Scheduled);
    }

    #[tokio::test]
    async fn unknown_players_are_rejected() {
        let directory: Arc<dyn PlayerDirectory> =
            Arc::new(LocalDirectory::new(users_with(2).await));
        let service = service(Some(directory));

        assert!(service
            .engine()
            .create(create(as_subject(Uuid::new_v4()), vec![1, 2]))
            .await
            .is_ok());

        let err = service
            .engine()
            .create(create(as_subject(Uuid::new_v4()), vec![1, 7]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message, "player 7 does not exist");
    }

    #[tokio::test]
    async fn only_owner_may_update() {
        let owner = Uuid::new_v4();
        let service = service(None);
        let created = service
            .engine()
            .create(create(as_subject(owner), vec![1, 2]))
            .await
            .unwrap();

        let finish = |ctx: RequestContext| UpdateInput {
            ctx,
            key: created.data.id,
            patch: MatchPatch {
                winner: Some(2),
                status: Some(MatchStatus::Completed),
                ..MatchPatch::default()
            },
        };

        let err = service.engine().update(finish(as_subject(Uuid::new_v4()))).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let updated = service.engine().update(finish(as_subject(owner))).await.unwrap();
        assert_eq!(updated.data.winner, Some(2));
        assert_eq!(updated.data.status, MatchStatus::Completed);
        assert!(updated.data.updated_at > created.data.updated_at);
    }

    #[tokio::test]
    async fn winner_outside_players_is_bad_request() {
        let owner = Uuid::new_v4();
        let service = service(None);
        let created = service
            .engine()
            .create(create(as_subject(owner), vec![1, 2]))
            .await
            .unwrap();

        let err = service
            .engine()
            .update(UpdateInput {
                ctx: as_subject(owner),
                key: created.data.id,
                patch: MatchPatch {
                    winner: Some(99),
                    status: Some(MatchStatus::Completed),
                    ..MatchPatch::default()
                },
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.message.contains("99"));

        let stored = service
            .engine()
            .read(ReadInput {
                ctx: RequestContext::anonymous("r"),
                key: created.data.id,
                presented_secret: None,
            })
            .await
            .unwrap();
        assert_eq!(stored.data, created.data);
    }
}
