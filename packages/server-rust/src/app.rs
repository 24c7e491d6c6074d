//! Wires configuration into services, stores, and routes.
//!
//! One process hosts any subset of the auth, users and matches services.
//! All hosted services share one [`MonotonicClock`]; each record family gets
//! its own store.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use rally_core::records::{AuthCredential, MatchRecord, UserProfile};
use rally_core::MonotonicClock;
use tracing::{info, warn};

use crate::network::handlers::{auth_routes, entity_routes, EntityState, Mount};
use crate::network::NetworkModule;
use crate::service::config::{AppConfig, ServiceKind, ServiceSelection, GATEWAY_SERVICE};
use crate::service::domain::{
    AuthService, LocalDirectory, MatchService, PeerDirectory, PlayerDirectory, UserService,
};
use crate::service::gateway::{CredentialExchange, GatewayClient};
use crate::service::registry::{ServiceContext, ServiceRegistry};
use crate::service::token::{IdentityDecoder, TokenMinter};
use crate::storage::{MemoryStore, Store};

/// Assembled services and their routes, ready to be served.
pub struct App {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ServiceRegistry>,
    pub routes: Router,
}

impl App {
    /// Context handed to every service's `init`.
    #[must_use]
    pub fn context(&self) -> ServiceContext {
        ServiceContext {
            config: Arc::clone(&self.config),
        }
    }

    /// Router with health routes and middleware, without binding a port.
    #[must_use]
    pub fn router(&self) -> Router {
        self.network().build_router()
    }

    /// Network module serving these routes under the configured listener.
    #[must_use]
    pub fn network(&self) -> NetworkModule {
        NetworkModule::new(
            self.config.network(),
            self.routes.clone(),
            self.registry.names(),
        )
    }
}

/// Builds an [`App`] from configuration.
pub struct AppBuilder {
    config: Arc<AppConfig>,
    selection: ServiceSelection,
    exchange: Option<Arc<CredentialExchange>>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            selection: ServiceSelection::All,
            exchange: None,
        }
    }

    #[must_use]
    pub fn services(mut self, selection: ServiceSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Uses `exchange` for gateway credentials instead of a client built
    /// from `services.gateway`.
    #[must_use]
    pub fn credentials(mut self, exchange: Arc<CredentialExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// # Errors
    ///
    /// Fails when the auth service is selected without a gateway URL or a
    /// supplied exchange, or when an HTTP client cannot be built.
    pub fn build(self) -> anyhow::Result<App> {
        let Self {
            config,
            selection,
            exchange,
        } = self;

        let clock = Arc::new(MonotonicClock::system());
        let identity = Arc::new(identity_decoder(&config));
        let registry = Arc::new(ServiceRegistry::new());
        let mut routes = Router::new();

        if selection.includes(ServiceKind::Auth) {
            let exchange = match exchange {
                Some(exchange) => exchange,
                None => {
                    let base_url = config.service_url(GATEWAY_SERVICE).with_context(|| {
                        format!("services.{GATEWAY_SERVICE} is required by the auth service")
                    })?;
                    let client = GatewayClient::new(
                        base_url,
                        config.gateway.principal.clone(),
                        config.gateway_timeout(),
                    )
                    .context("building gateway client")?;
                    Arc::new(CredentialExchange::new(Arc::new(client)))
                }
            };
            let store: Arc<dyn Store<AuthCredential>> = Arc::new(MemoryStore::new());
            let auth = registry.register(AuthService::new(
                store,
                exchange,
                TokenMinter::new(config.token_ttl()),
                Arc::clone(&clock),
                config.gateway.eager,
            ));
            routes = routes.merge(auth_routes(EntityState {
                engine: auth.engine().clone(),
                identity: Arc::clone(&identity),
            }));
        }

        let users_store: Arc<dyn Store<UserProfile>> = Arc::new(MemoryStore::new());
        let hosts_users = selection.includes(ServiceKind::Users);
        if hosts_users {
            let users = registry.register(UserService::new(
                Arc::clone(&users_store),
                Arc::clone(&clock),
            ));
            routes = routes.merge(entity_routes(
                Mount {
                    singular: "user",
                    plural: "users",
                },
                EntityState {
                    engine: users.engine().clone(),
                    identity: Arc::clone(&identity),
                },
            ));
        }

        if selection.includes(ServiceKind::Matches) {
            let directory: Option<Arc<dyn PlayerDirectory>> = if hosts_users {
                Some(Arc::new(LocalDirectory::new(users_store)))
            } else if let Some(base_url) = config.service_url("users") {
                Some(Arc::new(
                    PeerDirectory::new(base_url, config.gateway_timeout())
                        .context("building users client")?,
                ))
            } else {
                None
            };
            let store: Arc<dyn Store<MatchRecord>> = Arc::new(MemoryStore::new());
            let matches = registry.register(MatchService::new(
                store,
                Arc::clone(&clock),
                directory,
            ));
            routes = routes.merge(entity_routes(
                Mount {
                    singular: "match",
                    plural: "matches",
                },
                EntityState {
                    engine: matches.engine().clone(),
                    identity: Arc::clone(&identity),
                },
            ));
        }

        info!(
            services = ?registry.names(),
            store = ?config.store.kind,
            ?selection,
            "services assembled"
        );

        Ok(App {
            config,
            registry,
            routes,
        })
    }
}

/// Verifies bearer signatures when a shared secret is configured, otherwise
/// trusts the gateway to have done so.
fn identity_decoder(config: &AppConfig) -> IdentityDecoder {
    if let Some(secret) = config.identity.shared_secret.as_deref() {
        return IdentityDecoder::verifying(secret);
    }
    warn!(
        host = %config.server.host,
        "identity.shared_secret is unset: bearer signatures are not verified, \
         so callers not fronted by the gateway can forge any identity"
    );
    IdentityDecoder::trusting_gateway()
}
