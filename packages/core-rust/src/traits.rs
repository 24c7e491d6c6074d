use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Primary key of a record family.
///
/// Implemented for `i64` (store-assigned sequence), `Uuid` (stamped before
/// persistence), and `String` (natural keys such as a normalized email).
pub trait RecordKey:
    Clone + Eq + Ord + Hash + Display + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Parses a key from its URL path segment form.
    fn parse_key(raw: &str) -> Option<Self>;

    /// Produces a key for a record created without one. `seq` is the store's
    /// next sequence number (1-based).
    fn generate(seq: u64) -> Self;
}

impl RecordKey for i64 {
    fn parse_key(raw: &str) -> Option<Self> {
        raw.parse::<i64>().ok().filter(|id| *id > 0)
    }

    fn generate(seq: u64) -> Self {
        i64::try_from(seq).unwrap_or(i64::MAX)
    }
}

impl RecordKey for Uuid {
    fn parse_key(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok()
    }

    fn generate(_seq: u64) -> Self {
        Uuid::new_v4()
    }
}

impl RecordKey for String {
    fn parse_key(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn generate(seq: u64) -> Self {
        seq.to_string()
    }
}

/// A persisted record family (auth credential, user profile, match record).
///
/// The associated staging types are what hooks edit before the store call:
/// `Draft` for create, `Patch` for update, `Filter` for list. Records are
/// only ever built by [`Entity::materialize`] and changed by
/// [`Entity::apply`], both invoked by the store.
pub trait Entity: Clone + Debug + Serialize + Send + Sync + 'static {
    type Key: RecordKey;
    type Draft: Clone + Debug + Send + Sync + 'static;
    type Patch: Clone + Debug + Send + Sync + 'static;
    type Filter: Clone + Debug + Default + Send + Sync + 'static;

    /// Human-readable family name used in log fields and messages.
    const KIND: &'static str;

    /// Name of the key field, used in duplicate-key messages.
    const KEY_FIELD: &'static str = "id";

    /// Name of the secondary unique field, if [`Entity::unique_key`] is used.
    const UNIQUE_FIELD: &'static str = "key";

    fn key(&self) -> &Self::Key;

    /// Key already stamped into a draft, if any.
    fn draft_key(draft: &Self::Draft) -> Option<Self::Key>;

    /// Builds the persisted record from a finalized draft.
    fn materialize(key: Self::Key, draft: Self::Draft) -> Self;

    /// Applies a finalized patch in place.
    ///
    /// # Errors
    ///
    /// Returns a message when the patch is inconsistent with the record.
    /// The record is left untouched in that case.
    fn apply(&mut self, patch: Self::Patch) -> Result<(), String>;

    fn matches(&self, _filter: &Self::Filter) -> bool {
        true
    }

    /// Subject id that owns this record, checked against an owner scope on
    /// update and delete.
    fn owner(&self) -> Option<String> {
        None
    }

    /// Secondary uniqueness constraint enforced by the store on create.
    fn unique_key(&self) -> Option<String> {
        None
    }
}
