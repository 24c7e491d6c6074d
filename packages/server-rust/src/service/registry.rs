use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::config::AppConfig;

// ---------------------------------------------------------------------------
// ServiceContext
// ---------------------------------------------------------------------------

/// Context handed to services during initialization.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<AppConfig>,
}

// ---------------------------------------------------------------------------
// ManagedService trait
// ---------------------------------------------------------------------------

/// Lifecycle-managed service. The auth, users and matches services implement
/// this.
///
/// Services are initialized in registration order and shut down in reverse
/// order. The `Any` bound enables typed lookup via
/// [`ServiceRegistry::get`].
#[async_trait]
pub trait ManagedService: Send + Sync + Any {
    /// Unique name of this service (`"auth"`, `"users"`, `"matches"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Shut down the service. If `terminate` is true, skip graceful cleanup.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Registry for lifecycle-managed services, with lookup by name and by
/// concrete type.
pub struct ServiceRegistry {
    by_name: DashMap<&'static str, Arc<dyn ManagedService>>,
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Registration order for deterministic init/shutdown sequencing.
    order: RwLock<Vec<&'static str>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_type: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers a service and returns the shared handle the registry keeps.
    pub fn register<T: ManagedService>(&self, service: T) -> Arc<T> {
        let name = service.name();
        let arc = Arc::new(service);
        self.by_name.insert(name, arc.clone());
        self.by_type.insert(TypeId::of::<T>(), arc.clone());
        self.order.write().push(name);
        arc
    }

    /// Retrieve a service by its concrete type.
    pub fn get<T: ManagedService>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Retrieve a service by its name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    /// Service names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.read().is_empty()
    }

    /// Initialize all registered services in registration order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first `init()` failure.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for name in self.names() {
            if let Some(service) = self.get_by_name(name) {
                service.init(ctx).await?;
                info!(service = name, "service initialized");
            }
        }
        Ok(())
    }

    /// Shut down all registered services in reverse registration order.
    ///
    /// Every service gets its shutdown call even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first `shutdown()` failure after all services ran.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let mut first_error = None;
        for name in self.names().into_iter().rev() {
            if let Some(service) = self.get_by_name(name) {
                if let Err(err) = service.shutdown(terminate).await {
                    warn!(service = name, error = %err, "service shutdown failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
