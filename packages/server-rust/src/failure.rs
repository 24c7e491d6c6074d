//! Failures raised by stores and downstream collaborators.
//!
//! A closed set of variants with an explicit `Other` arm. Every failure is
//! turned into a caller-facing outcome by
//! [`classify`](crate::service::classify::classify).

use rally_core::Entity;

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// No record for the given key.
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// Create would violate a uniqueness constraint.
    #[error("duplicate {entity}: {field} {value} already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Input failed structural or semantic validation.
    #[error("{0}")]
    Invalid(String),

    /// Caller identity missing or unparsable.
    #[error("{0}")]
    Unauthenticated(String),

    /// Caller authenticated but not permitted for the target record.
    #[error("{0}")]
    Forbidden(String),

    /// I/O, downstream, or otherwise unexpected failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Failure {
    #[must_use]
    pub fn not_found<E: Entity>(key: &E::Key) -> Self {
        Self::NotFound {
            entity: E::KIND,
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn duplicate<E: Entity>(field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: E::KIND,
            field,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn forbidden<E: Entity>(key: &E::Key) -> Self {
        Self::Forbidden(format!("not permitted to modify {} {key}", E::KIND))
    }
}
