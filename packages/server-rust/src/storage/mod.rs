//! Persistence layer for the Rally services.
//!
//! - [`Store`]: the capability set (create/read/update/delete/list) the
//!   request engine invokes exactly once per request
//! - [`Scope`]: ownership guard stamped by hooks, enforced by the store
//! - [`MemoryStore`]: concurrent in-memory implementation

pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{Scope, Store};
