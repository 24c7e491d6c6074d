//! Failure classification: maps every [`Failure`] onto exactly one
//! [`Rejection`].
//!
//! Store failures and credential exchange failures are routed through here.
//! Hook rejections bypass it because a hook picks its own kind.

use rally_core::Rejection;

use crate::failure::Failure;

/// Classifies a failure. Total: `Other` is the fallback for anything that is
/// not one of the recognized categories.
#[must_use]
pub fn classify(failure: &Failure) -> Rejection {
    match failure {
        Failure::NotFound { .. } => Rejection::not_found(failure.to_string()),
        Failure::Duplicate { .. } => Rejection::conflict(failure.to_string()),
        Failure::Invalid(message) => Rejection::bad_request(message.clone()),
        Failure::Unauthenticated(message) => Rejection::unauthorized(message.clone()),
        Failure::Forbidden(message) => Rejection::forbidden(message.clone()),
        Failure::Other(err) => Rejection::internal(format!("{err:#}")),
    }
}

impl From<Failure> for Rejection {
    fn from(failure: Failure) -> Self {
        classify(&failure)
    }
}
