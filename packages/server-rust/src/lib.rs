//! Rally Server: hooked CRUD engine, stores, gateway credential exchange,
//! and the HTTP surface for the auth, users and matches services.

pub mod app;
pub mod failure;
pub mod network;
pub mod service;
pub mod storage;

pub use app::{App, AppBuilder};
pub use failure::Failure;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
