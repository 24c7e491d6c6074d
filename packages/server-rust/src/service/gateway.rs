//! Credential exchange against the API gateway.
//!
//! Two sequential calls provision token-signing material:
//!
//! 1. `POST /consumers {"username": <principal>}` registers the service
//!    principal and answers `201 {id, username}`.
//! 2. `POST /consumers/{username}/jwt` issues a signing credential and
//!    answers `201 {key, secret}`.
//!
//! Any other status is a failure carrying the gateway's response body. The
//! credential is kept in process memory once obtained and never persisted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::failure::Failure;

const REGISTER_STEP: &str = "consumer registration";
const CREDENTIAL_STEP: &str = "credential request";

/// Signing material issued by the gateway.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    /// Issuer identifier, placed in the `iss` claim.
    pub key: String,
    /// Shared HMAC secret.
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

/// Consumer record returned by the registration step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Consumer {
    pub id: String,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway {step} answered {status}: {body}")]
    Rejected {
        step: &'static str,
        status: u16,
        body: String,
    },

    #[error("gateway {step} timed out")]
    Timeout { step: &'static str },

    #[error("gateway {step} failed: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("gateway {step} returned an unreadable body: {source}")]
    Decode {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl From<GatewayError> for Failure {
    fn from(err: GatewayError) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

/// Anything that can produce a signing credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn obtain(&self) -> Result<Credential, GatewayError>;
}

// ---------------------------------------------------------------------------
// GatewayClient
// ---------------------------------------------------------------------------

/// HTTP client for the gateway's consumer endpoints.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    principal: String,
}

impl GatewayClient {
    /// Builds a client whose every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        principal: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                step: "client setup",
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            principal: principal.into(),
        })
    }

    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Step 1: registers the configured principal.
    ///
    /// # Errors
    ///
    /// Fails on any status other than `201 Created`, on transport errors and
    /// on timeout.
    pub async fn register_consumer(&self) -> Result<Consumer, GatewayError> {
        debug!(principal = %self.principal, "registering gateway consumer");
        let response = self
            .http
            .post(format!("{}/consumers", self.base_url))
            .json(&serde_json::json!({ "username": self.principal }))
            .send()
            .await
            .map_err(|err| transport(REGISTER_STEP, err))?;
        expect_created(REGISTER_STEP, response).await
    }

    /// Step 2: requests a signing credential for a registered consumer.
    ///
    /// # Errors
    ///
    /// Fails on any status other than `201 Created`, on transport errors and
    /// on timeout.
    pub async fn request_credential(&self, consumer: &Consumer) -> Result<Credential, GatewayError> {
        let response = self
            .http
            .post(format!("{}/consumers/{}/jwt", self.base_url, consumer.username))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| transport(CREDENTIAL_STEP, err))?;
        expect_created(CREDENTIAL_STEP, response).await
    }
}

#[async_trait]
impl CredentialSource for GatewayClient {
    async fn obtain(&self) -> Result<Credential, GatewayError> {
        let consumer = self.register_consumer().await?;
        let credential = self.request_credential(&consumer).await?;
        info!(
            principal = %consumer.username,
            consumer_id = %consumer.id,
            issuer = %credential.key,
            "gateway credential issued"
        );
        Ok(credential)
    }
}

fn transport(step: &'static str, source: reqwest::Error) -> GatewayError {
    if source.is_timeout() {
        GatewayError::Timeout { step }
    } else {
        GatewayError::Transport { step, source }
    }
}

async fn expect_created<T: DeserializeOwned>(
    step: &'static str,
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    if status != StatusCode::CREATED {
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(step, error = %err, "gateway error body could not be read");
                format!("<unreadable body: {err}>")
            }
        };
        warn!(step, status = status.as_u16(), "gateway rejected request");
        return Err(GatewayError::Rejected {
            step,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|source| GatewayError::Decode { step, source })
}

// ---------------------------------------------------------------------------
// CredentialExchange
// ---------------------------------------------------------------------------

/// Holds the credential for the lifetime of the process.
///
/// The first successful [`CredentialExchange::credential`] call performs the
/// exchange; later calls reuse the result. A failed exchange is not cached,
/// so the next request tries again.
pub struct CredentialExchange {
    source: Arc<dyn CredentialSource>,
    cached: OnceCell<Credential>,
}

impl CredentialExchange {
    #[must_use]
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            cached: OnceCell::new(),
        }
    }

    /// Exchange that always yields `credential`, without a gateway.
    #[must_use]
    pub fn fixed(credential: Credential) -> Self {
        Self {
            source: Arc::new(Fixed(credential.clone())),
            cached: OnceCell::from(credential),
        }
    }

    /// Returns the cached credential, running the exchange if needed.
    ///
    /// # Errors
    ///
    /// Returns the exchange failure when no credential is cached yet.
    pub async fn credential(&self) -> Result<Credential, GatewayError> {
        self.cached
            .get_or_try_init(|| self.source.obtain())
            .await
            .cloned()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cached.initialized()
    }
}

impl fmt::Debug for CredentialExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialExchange")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

struct Fixed(Credential);

#[async_trait]
impl CredentialSource for Fixed {
    async fn obtain(&self) -> Result<Credential, GatewayError> {
        Ok(self.0.clone())
    }
}
