//! Process configuration, loaded once at startup from a JSON document.
//!
//! Every section has defaults, so `{}` is a valid document for the users and
//! matches services. The auth service additionally needs a `gateway` entry
//! under `services`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::network::{NetworkConfig, TlsConfig};

/// Logical name of the gateway in [`AppConfig::services`].
pub const GATEWAY_SERVICE: &str = "gateway";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub store: StoreSection,
    /// Logical service name -> base URL (`gateway`, `users`, ...).
    pub services: BTreeMap<String, String>,
    pub gateway: GatewaySection,
    pub token: TokenSection,
    pub identity: IdentitySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_ms: u64,
    pub max_body_bytes: usize,
    pub tls: Option<TlsSection>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            request_timeout_ms: 30_000,
            max_body_bytes: 1024 * 1024,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsSection {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub kind: StoreKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Consumer name registered with the gateway.
    pub principal: String,
    pub timeout_ms: u64,
    /// Run the credential exchange during service init instead of on the
    /// first token request.
    pub eager: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            principal: "rally-auth".to_string(),
            timeout_ms: 5_000,
            eager: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenSection {
    pub ttl_secs: u64,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self { ttl_secs: 3_600 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    /// When set, bearer token signatures are verified with this secret.
    /// Otherwise the gateway in front is trusted to have verified them.
    pub shared_secret: Option<String>,
}

impl AppConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks cross-section requirements for the selected services.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the auth service is selected
    /// without a gateway URL, or when a timeout is zero.
    pub fn validate(&self, selection: ServiceSelection) -> Result<(), ConfigError> {
        if selection.includes(ServiceKind::Auth) && self.service_url(GATEWAY_SERVICE).is_none() {
            return Err(ConfigError::Invalid(format!(
                "services.{GATEWAY_SERVICE} is required by the auth service"
            )));
        }
        if self.gateway.timeout_ms == 0 || self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn service_url(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway.timeout_ms)
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token.ttl_secs)
    }

    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            tls: self.server.tls.as_ref().map(|tls| TlsConfig {
                cert_path: tls.cert_path.clone(),
                key_path: tls.key_path.clone(),
            }),
            cors_origins: self.server.cors_origins.clone(),
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            max_body_bytes: self.server.max_body_bytes,
        }
    }
}

/// One of the services this binary can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Auth,
    Users,
    Matches,
}

/// Which services to host in this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ServiceSelection {
    Auth,
    Users,
    Matches,
    #[default]
    All,
}

impl ServiceSelection {
    #[must_use]
    pub fn includes(self, kind: ServiceKind) -> bool {
        matches!(
            (self, kind),
            (Self::All, _)
                | (Self::Auth, ServiceKind::Auth)
                | (Self::Users, ServiceKind::Users)
                | (Self::Matches, ServiceKind::Matches)
        )
    }
}
