//! Network module with deferred startup lifecycle.
//!
//! `new()` takes the service routes, `start()` binds the TCP listener, and
//! `serve()` accepts connections. Services are initialized between `start()`
//! and `serve()` so the bound port is known before any traffic arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{health_handler, liveness_handler, readiness_handler, AppState};
use super::middleware::apply_http_layers;
use super::shutdown::{track_in_flight, ShutdownController};

/// Longest wait for in-flight requests after the shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Manages the HTTP server lifecycle.
///
/// 1. `new()`: allocates the shutdown controller, keeps the service routes
/// 2. `start()`: binds the TCP listener to the configured address
/// 3. `serve()`: accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    routes: Router,
    services: Arc<[&'static str]>,
}

impl NetworkModule {
    /// Creates a network module without binding any port.
    ///
    /// `routes` are the service routes, already carrying their state;
    /// `services` names the hosted services for the health report.
    #[must_use]
    pub fn new(config: NetworkConfig, routes: Router, services: Vec<&'static str>) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            routes,
            services: Arc::from(services),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the full router: health routes plus the service routes,
    /// wrapped in the HTTP middleware stack.
    ///
    /// - `GET /health`: health JSON
    /// - `GET /health/live`: liveness probe
    /// - `GET /health/ready`: readiness probe
    ///
    /// Only the service routes are tracked as in flight, so probes keep
    /// answering while the server drains.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            start_time: Instant::now(),
            services: Arc::clone(&self.services),
        };

        let health = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(state);

        let services = self
            .routes
            .clone()
            .layer(from_fn_with_state(Arc::clone(&self.shutdown), track_in_flight));

        apply_http_layers(health.merge(services), &self.config)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 asks for an OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then drains.
    ///
    /// When the signal fires the state moves to Draining (new requests get
    /// 503), then up to 30 seconds are given to in-flight requests before the
    /// state moves to Stopped.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal I/O error or unreadable TLS material.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let shutdown_ctrl = self.shutdown;

        let signal_ctrl = Arc::clone(&shutdown_ctrl);
        let signal = async move {
            shutdown.await;
            info!("shutdown signal received, draining");
            signal_ctrl.trigger_shutdown();
        };

        shutdown_ctrl.set_ready();

        if let Some(ref tls_config) = self.config.tls {
            serve_tls(listener, router, tls_config, signal).await?;
        } else {
            info!("serving plain HTTP");
            axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await?;
        }

        drain(&shutdown_ctrl).await;
        Ok(())
    }
}

/// Serves TLS connections using `axum-server` with rustls, reusing the
/// pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: &TlsConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls_config.cert_path, &tls_config.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        signal.await;
        shutdown_handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
    });

    info!(%addr, "serving TLS");

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(shutdown_ctrl: &ShutdownController) {
    shutdown_ctrl.trigger_shutdown();
    if shutdown_ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("all requests drained");
    } else {
        warn!(
            in_flight = shutdown_ctrl.in_flight_count(),
            "drain timeout expired with requests still in flight"
        );
    }
}
