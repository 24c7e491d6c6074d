//! The persistence capability set consumed by the request engine.

use async_trait::async_trait;
use rally_core::Entity;

use crate::failure::Failure;

/// Ownership guard stamped by hooks and enforced by the store.
///
/// When `owner` is set, update and delete fail with
/// [`Failure::Forbidden`] unless the stored record's owner matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub owner: Option<String>,
}

impl Scope {
    #[must_use]
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
        }
    }

    /// Whether a record owned by `record_owner` may be modified under this scope.
    #[must_use]
    pub fn permits(&self, record_owner: Option<&str>) -> bool {
        match (&self.owner, record_owner) {
            (None, _) => true,
            (Some(required), Some(actual)) => required == actual,
            (Some(_), None) => false,
        }
    }
}

/// Persistence for one record family.
///
/// Owns no business logic: returns records or a typed [`Failure`]
/// (`NotFound`, `Duplicate`, `Forbidden` for scope violations, `Other`).
/// Implementations must be safe for concurrent use; the engine adds no
/// locking around them.
///
/// Used as `Arc<dyn Store<E>>`.
#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    /// Persists a new record built from a finalized draft.
    async fn create(&self, draft: E::Draft) -> Result<E, Failure>;

    async fn read(&self, key: &E::Key) -> Result<E, Failure>;

    /// Applies a finalized patch and returns the updated record.
    async fn update(&self, key: &E::Key, patch: E::Patch, scope: &Scope) -> Result<E, Failure>;

    async fn delete(&self, key: &E::Key, scope: &Scope) -> Result<(), Failure>;

    /// All records matching `filter`, ordered by key.
    async fn list(&self, filter: &E::Filter) -> Result<Vec<E>, Failure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_permits_everything() {
        let scope = Scope::default();
        assert!(scope.permits(Some("a")));
        assert!(scope.permits(None));
    }

    #[test]
    fn scoped_requires_matching_owner() {
        let scope = Scope::owned_by("a");
        assert!(scope.permits(Some("a")));
        assert!(!scope.permits(Some("b")));
        assert!(!scope.permits(None));
    }
}
