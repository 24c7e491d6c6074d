//! Per-verb operation inputs, staging structures, and replies.
//!
//! An *input* is what the HTTP edge decoded and validated; hooks see it
//! read-only. A *staging* structure is seeded from the input and is the only
//! thing pre-hooks may edit before it is handed to the store.

use std::fmt;

use rally_core::{Entity, RequestContext};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::storage::Scope;

/// CRUD verb handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gives hooks uniform access to the caller context of any input.
pub trait HasContext {
    fn ctx(&self) -> &RequestContext;
}

/// Staging structures that carry an ownership [`Scope`].
pub trait Scoped {
    fn scope_mut(&mut self) -> &mut Scope;
}

/// Staging structures that carry the target key.
pub trait Keyed<K> {
    fn key_mut(&mut self) -> &mut K;
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreateInput<E: Entity> {
    pub ctx: RequestContext,
    pub draft: E::Draft,
}

#[derive(Clone)]
pub struct ReadInput<E: Entity> {
    pub ctx: RequestContext,
    pub key: E::Key,
    /// Secret presented alongside the key, checked by verification hooks
    /// (password on login). Never logged.
    pub presented_secret: Option<String>,
}

impl<E: Entity> fmt::Debug for ReadInput<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadInput")
            .field("ctx", &self.ctx)
            .field("key", &self.key)
            .field("presented_secret", &self.presented_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UpdateInput<E: Entity> {
    pub ctx: RequestContext,
    pub key: E::Key,
    pub patch: E::Patch,
}

#[derive(Debug, Clone)]
pub struct DeleteInput<E: Entity> {
    pub ctx: RequestContext,
    pub key: E::Key,
}

#[derive(Debug, Clone)]
pub struct ListInput<E: Entity> {
    pub ctx: RequestContext,
    pub filter: E::Filter,
}

macro_rules! has_context {
    ($($input:ident),+ $(,)?) => {
        $(
            impl<E: Entity> HasContext for $input<E> {
                fn ctx(&self) -> &RequestContext {
                    &self.ctx
                }
            }
        )+
    };
}

has_context!(CreateInput, ReadInput, UpdateInput, DeleteInput, ListInput);

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Staging for read and delete.
#[derive(Debug, Clone)]
pub struct KeyArgs<K> {
    pub key: K,
    pub scope: Scope,
}

impl<K> KeyArgs<K> {
    #[must_use]
    pub fn new(key: K) -> Self {
        Self {
            key,
            scope: Scope::default(),
        }
    }
}

/// Staging for update.
#[derive(Debug, Clone)]
pub struct UpdateArgs<K, P> {
    pub key: K,
    pub patch: P,
    pub scope: Scope,
}

impl<K> Scoped for KeyArgs<K> {
    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

impl<K, P> Scoped for UpdateArgs<K, P> {
    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

impl<K> Keyed<K> for KeyArgs<K> {
    fn key_mut(&mut self) -> &mut K {
        &mut self.key
    }
}

impl<K, P> Keyed<K> for UpdateArgs<K, P> {
    fn key_mut(&mut self) -> &mut K {
        &mut self.key
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Store result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted<K> {
    pub id: K,
    pub deleted: bool,
}

/// Extra response fields contributed by post-hooks (e.g. a minted `token`).
pub type Annotations = Map<String, Value>;

/// Successful outcome: the store result plus post-hook annotations.
#[derive(Debug, Clone)]
pub struct Reply<R> {
    pub data: R,
    pub annotations: Annotations,
}

impl<R: Serialize> Reply<R> {
    /// Serializes the response body.
    ///
    /// Annotations are merged into an object body. A non-object body (a list)
    /// is wrapped as `{"items": [...]}` when annotations are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store result cannot be serialized.
    pub fn into_body(self) -> Result<Value, serde_json::Error> {
        let data = serde_json::to_value(self.data)?;
        if self.annotations.is_empty() {
            return Ok(data);
        }
        let mut body = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("items".to_string(), other);
                map
            }
        };
        body.extend(self.annotations);
        Ok(Value::Object(body))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn body_without_annotations_is_data() {
        let reply = Reply {
            data: vec![1, 2, 3],
            annotations: Annotations::new(),
        };
        assert_eq!(reply.into_body().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn annotations_merge_into_object() {
        let mut annotations = Annotations::new();
        annotations.insert("token".to_string(), json!("abc"));
        let reply = Reply {
            data: Deleted { id: 4, deleted: true },
            annotations,
        };
        assert_eq!(
            reply.into_body().unwrap(),
            json!({ "id": 4, "deleted": true, "token": "abc" })
        );
    }

    #[test]
    fn list_with_annotations_is_wrapped() {
        let mut annotations = Annotations::new();
        annotations.insert("total".to_string(), json!(2));
        let reply = Reply {
            data: vec!["a", "b"],
            annotations,
        };
        assert_eq!(
            reply.into_body().unwrap(),
            json!({ "items": ["a", "b"], "total": 2 })
        );
    }
}
