//! Request processing for the Rally services.
//!
//! 1. **Operations** (`operation`): per-verb inputs, staging, replies
//! 2. **Hooks** (`hooks`): ordered pre/post callbacks per verb
//! 3. **Engine** (`engine`): pre-hooks, one store call, post-hooks
//! 4. **Classification** (`classify`): `Failure` -> `Rejection`
//! 5. **Credentials** (`gateway`, `token`, `password`): gateway exchange,
//!    token minting and decoding, password hashing
//! 6. **Domain services** (`domain`): auth, users, matches
//! 7. **Lifecycle** (`registry`, `config`)

pub mod classify;
pub mod config;
pub mod domain;
pub mod engine;
pub mod gateway;
pub mod hooks;
pub mod operation;
pub mod password;
pub mod registry;
pub mod token;

pub use classify::classify;
pub use config::{AppConfig, ConfigError, ServiceKind, ServiceSelection};
pub use engine::RequestEngine;
pub use gateway::{Credential, CredentialExchange, CredentialSource, GatewayClient, GatewayError};
pub use hooks::{post_fn, pre_fn, HookRegistry, HookRegistryBuilder, PostHook, PreHook};
pub use operation::{
    Annotations, CreateInput, DeleteInput, Deleted, ListInput, ReadInput, Reply, UpdateInput, Verb,
};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use token::{IdentityDecoder, TokenMinter};
