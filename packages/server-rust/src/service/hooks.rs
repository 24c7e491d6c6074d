//! Ordered pre/post hooks around a single store call.
//!
//! A [`HookRegistry`] holds one [`Phase`] per CRUD verb. It is assembled once
//! through [`HookRegistryBuilder`] during service assembly and then frozen
//! behind an `Arc`; no hooks are added while requests are being served.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rally_core::{Entity, Rejection};
use tracing::debug;

use super::operation::{
    Annotations, CreateInput, DeleteInput, Deleted, KeyArgs, ListInput, ReadInput, UpdateArgs,
    UpdateInput, Verb,
};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Runs before the store call.
///
/// Sees the caller's input read-only and may edit the staging structure `S`
/// that will be handed to the store. Returning `Err` aborts the request with
/// that rejection verbatim: later hooks do not run and the store is not
/// called.
#[async_trait]
pub trait PreHook<I, S>: Send + Sync {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    async fn run(&self, input: &I, staged: &mut S) -> Result<(), Rejection>;
}

/// Runs after a successful store call.
///
/// Sees the input and the store result read-only and may add response fields
/// through `annotations`. Returning `Err` aborts the remaining hooks; the
/// store mutation is kept.
#[async_trait]
pub trait PostHook<I, R>: Send + Sync {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    async fn run(&self, input: &I, result: &R, annotations: &mut Annotations)
        -> Result<(), Rejection>;
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Pre-hook backed by a synchronous closure. Built with [`pre_fn`].
pub struct PreFn<F> {
    name: &'static str,
    f: F,
}

/// Post-hook backed by a synchronous closure. Built with [`post_fn`].
pub struct PostFn<F> {
    name: &'static str,
    f: F,
}

/// Wraps a closure as a named [`PreHook`].
pub fn pre_fn<I, S, F>(name: &'static str, f: F) -> PreFn<F>
where
    F: Fn(&I, &mut S) -> Result<(), Rejection> + Send + Sync,
{
    PreFn { name, f }
}

/// Wraps a closure as a named [`PostHook`].
pub fn post_fn<I, R, F>(name: &'static str, f: F) -> PostFn<F>
where
    F: Fn(&I, &R, &mut Annotations) -> Result<(), Rejection> + Send + Sync,
{
    PostFn { name, f }
}

#[async_trait]
impl<I, S, F> PreHook<I, S> for PreFn<F>
where
    I: Sync,
    S: Send,
    F: Fn(&I, &mut S) -> Result<(), Rejection> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, input: &I, staged: &mut S) -> Result<(), Rejection> {
        (self.f)(input, staged)
    }
}

#[async_trait]
impl<I, R, F> PostHook<I, R> for PostFn<F>
where
    I: Sync,
    R: Sync,
    F: Fn(&I, &R, &mut Annotations) -> Result<(), Rejection> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn run(
        &self,
        input: &I,
        result: &R,
        annotations: &mut Annotations,
    ) -> Result<(), Rejection> {
        (self.f)(input, result, annotations)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Pre- and post-hooks of one verb, in registration order.
pub struct Phase<I, S, R> {
    pre: Vec<Arc<dyn PreHook<I, S>>>,
    post: Vec<Arc<dyn PostHook<I, R>>>,
}

impl<I, S, R> Default for Phase<I, S, R> {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            post: Vec::new(),
        }
    }
}

impl<I, S, R> fmt::Debug for Phase<I, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("pre", &self.pre.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("post", &self.post.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl<I, S, R> Phase<I, S, R>
where
    I: Sync,
    S: Send,
    R: Sync,
{
    #[must_use]
    pub fn pre_count(&self) -> usize {
        self.pre.len()
    }

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.post.len()
    }

    /// Runs pre-hooks in order, stopping at the first rejection.
    ///
    /// # Errors
    ///
    /// Returns the first hook's rejection unchanged.
    pub async fn run_pre(&self, input: &I, staged: &mut S) -> Result<(), Rejection> {
        for hook in &self.pre {
            if let Err(rejection) = hook.run(input, staged).await {
                debug!(hook = hook.name(), kind = %rejection.kind, "pre-hook rejected");
                return Err(rejection);
            }
        }
        Ok(())
    }

    /// Runs post-hooks in order, stopping at the first rejection.
    ///
    /// # Errors
    ///
    /// Returns the first hook's rejection unchanged.
    pub async fn run_post(
        &self,
        input: &I,
        result: &R,
        annotations: &mut Annotations,
    ) -> Result<(), Rejection> {
        for hook in &self.post {
            if let Err(rejection) = hook.run(input, result, annotations).await {
                debug!(hook = hook.name(), kind = %rejection.kind, "post-hook rejected");
                return Err(rejection);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type CreatePhase<E> = Phase<CreateInput<E>, <E as Entity>::Draft, E>;
pub type ReadPhase<E> = Phase<ReadInput<E>, KeyArgs<<E as Entity>::Key>, E>;
pub type UpdatePhase<E> =
    Phase<UpdateInput<E>, UpdateArgs<<E as Entity>::Key, <E as Entity>::Patch>, E>;
pub type DeletePhase<E> =
    Phase<DeleteInput<E>, KeyArgs<<E as Entity>::Key>, Deleted<<E as Entity>::Key>>;
pub type ListPhase<E> = Phase<ListInput<E>, <E as Entity>::Filter, Vec<E>>;

/// Immutable per-verb hook lists for one record family.
pub struct HookRegistry<E: Entity> {
    pub(crate) create: CreatePhase<E>,
    pub(crate) read: ReadPhase<E>,
    pub(crate) update: UpdatePhase<E>,
    pub(crate) delete: DeletePhase<E>,
    pub(crate) list: ListPhase<E>,
}

impl<E: Entity> HookRegistry<E> {
    #[must_use]
    pub fn builder() -> HookRegistryBuilder<E> {
        HookRegistryBuilder {
            registry: Self::default(),
        }
    }

    /// Registry with no hooks: every verb is a store passthrough.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(verb, pre, post)` hook counts, for startup logging.
    #[must_use]
    pub fn counts(&self) -> [(Verb, usize, usize); 5] {
        [
            (Verb::Create, self.create.pre_count(), self.create.post_count()),
            (Verb::Read, self.read.pre_count(), self.read.post_count()),
            (Verb::Update, self.update.pre_count(), self.update.post_count()),
            (Verb::Delete, self.delete.pre_count(), self.delete.post_count()),
            (Verb::List, self.list.pre_count(), self.list.post_count()),
        ]
    }
}

impl<E: Entity> Default for HookRegistry<E> {
    fn default() -> Self {
        Self {
            create: Phase::default(),
            read: Phase::default(),
            update: Phase::default(),
            delete: Phase::default(),
            list: Phase::default(),
        }
    }
}

impl<E: Entity> fmt::Debug for HookRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("entity", &E::KIND)
            .field("create", &self.create)
            .field("read", &self.read)
            .field("update", &self.update)
            .field("delete", &self.delete)
            .field("list", &self.list)
            .finish()
    }
}

/// Collects hooks in registration order, then freezes them.
pub struct HookRegistryBuilder<E: Entity> {
    registry: HookRegistry<E>,
}

macro_rules! register {
    ($pre:ident, $post:ident, $phase:ident, $input:ident, $staged:ty, $result:ty) => {
        #[must_use]
        pub fn $pre(mut self, hook: impl PreHook<$input<E>, $staged> + 'static) -> Self {
            self.registry.$phase.pre.push(Arc::new(hook));
            self
        }

        #[must_use]
        pub fn $post(mut self, hook: impl PostHook<$input<E>, $result> + 'static) -> Self {
            self.registry.$phase.post.push(Arc::new(hook));
            self
        }
    };
}

impl<E: Entity> HookRegistryBuilder<E> {
    register!(pre_create, post_create, create, CreateInput, E::Draft, E);
    register!(pre_read, post_read, read, ReadInput, KeyArgs<E::Key>, E);
    register!(pre_update, post_update, update, UpdateInput, UpdateArgs<E::Key, E::Patch>, E);
    register!(pre_delete, post_delete, delete, DeleteInput, KeyArgs<E::Key>, Deleted<E::Key>);
    register!(pre_list, post_list, list, ListInput, E::Filter, Vec<E>);

    #[must_use]
    pub fn build(self) -> Arc<HookRegistry<E>> {
        Arc::new(self.registry)
    }
}
