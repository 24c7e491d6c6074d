//! The hooked-CRUD request engine.
//!
//! Every verb follows the same lifecycle: seed a staging structure from the
//! input, run the verb's pre-hooks, call the store exactly once, run the
//! verb's post-hooks. Hook rejections are returned verbatim; store failures
//! are classified. Each request runs inside an `operation` tracing span that
//! records entity, verb, outcome, and duration.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use rally_core::{Entity, ErrorKind, Outcome};
use tracing::{error, info, info_span, Instrument};

use super::classify::classify;
use super::hooks::{HookRegistry, Phase};
use super::operation::{
    Annotations, CreateInput, DeleteInput, Deleted, HasContext, KeyArgs, ListInput, ReadInput,
    Reply, UpdateArgs, UpdateInput, Verb,
};
use crate::failure::Failure;
use crate::storage::Store;

/// Orchestrates hooks and store calls for one record family.
///
/// Cheap to clone: the store and the frozen hook registry are shared.
pub struct RequestEngine<E: Entity> {
    store: Arc<dyn Store<E>>,
    hooks: Arc<HookRegistry<E>>,
}

impl<E: Entity> Clone for RequestEngine<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hooks: Arc::clone(&self.hooks),
        }
    }
}

impl<E: Entity> RequestEngine<E> {
    #[must_use]
    pub fn new(store: Arc<dyn Store<E>>, hooks: Arc<HookRegistry<E>>) -> Self {
        Self { store, hooks }
    }

    /// Engine with no hooks registered for any verb.
    #[must_use]
    pub fn passthrough(store: Arc<dyn Store<E>>) -> Self {
        Self::new(store, HookRegistry::empty())
    }

    #[must_use]
    pub fn hooks(&self) -> &HookRegistry<E> {
        &self.hooks
    }

    /// # Errors
    ///
    /// Returns the first hook rejection, or the classified store failure.
    pub async fn create(&self, input: CreateInput<E>) -> Outcome<Reply<E>> {
        let staged = input.draft.clone();
        self.run(Verb::Create, &self.hooks.create, input, staged, |draft| {
            self.store.create(draft)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the first hook rejection, or the classified store failure.
    pub async fn read(&self, input: ReadInput<E>) -> Outcome<Reply<E>> {
        let staged = KeyArgs::new(input.key.clone());
        self.run(Verb::Read, &self.hooks.read, input, staged, |args| async move {
            self.store.read(&args.key).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the first hook rejection, or the classified store failure.
    pub async fn update(&self, input: UpdateInput<E>) -> Outcome<Reply<E>> {
        let staged = UpdateArgs {
            key: input.key.clone(),
            patch: input.patch.clone(),
            scope: crate::storage::Scope::default(),
        };
        self.run(Verb::Update, &self.hooks.update, input, staged, |args| async move {
            self.store.update(&args.key, args.patch, &args.scope).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the first hook rejection, or the classified store failure.
    pub async fn delete(&self, input: DeleteInput<E>) -> Outcome<Reply<Deleted<E::Key>>> {
        let staged = KeyArgs::new(input.key.clone());
        self.run(Verb::Delete, &self.hooks.delete, input, staged, |args| async move {
            let result = self.store.delete(&args.key, &args.scope).await;
            result.map(|()| Deleted {
                id: args.key,
                deleted: true,
            })
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the first hook rejection, or the classified store failure.
    pub async fn list(&self, input: ListInput<E>) -> Outcome<Reply<Vec<E>>> {
        let staged = input.filter.clone();
        self.run(Verb::List, &self.hooks.list, input, staged, |filter| async move {
            self.store.list(&filter).await
        })
        .await
    }

    async fn run<I, S, R, F, Fut>(
        &self,
        verb: Verb,
        phase: &Phase<I, S, R>,
        input: I,
        staged: S,
        call: F,
    ) -> Outcome<Reply<R>>
    where
        I: HasContext + Sync,
        S: Send,
        R: Send + Sync,
        F: FnOnce(S) -> Fut + Send,
        Fut: Future<Output = Result<R, Failure>> + Send,
    {
        let span = info_span!(
            "operation",
            entity = E::KIND,
            verb = verb.as_str(),
            request_id = %input.ctx().request_id,
            outcome = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = execute(phase, &input, staged, call).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let outcome = match &result {
                Ok(_) => "ok",
                Err(rejection) => rejection.kind.as_str(),
            };
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            match &result {
                Err(rejection) if rejection.kind == ErrorKind::Internal => {
                    error!(
                        entity = E::KIND,
                        verb = verb.as_str(),
                        detail = rejection.detail.as_deref().unwrap_or_default(),
                        "operation failed"
                    );
                }
                _ => info!(duration_ms, outcome, "operation complete"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Pre-hooks, one store call, post-hooks.
async fn execute<I, S, R, F, Fut>(
    phase: &Phase<I, S, R>,
    input: &I,
    mut staged: S,
    call: F,
) -> Outcome<Reply<R>>
where
    I: Sync,
    S: Send,
    R: Send + Sync,
    F: FnOnce(S) -> Fut + Send,
    Fut: Future<Output = Result<R, Failure>> + Send,
{
    phase.run_pre(input, &mut staged).await?;
    let data = call(staged).await.map_err(|failure| classify(&failure))?;
    let mut annotations = Annotations::new();
    phase.run_post(input, &data, &mut annotations).await?;
    Ok(Reply { data, annotations })
}
