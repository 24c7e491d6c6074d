//! Request outcomes: the closed set of error kinds a request can end in.
//!
//! Every request yields exactly one [`Outcome`]. Success carries the response
//! payload; every other kind is a [`Rejection`] bound to one HTTP status code
//! and a caller-facing message.

use std::fmt;

use serde::Serialize;

/// Caller-facing message used for every internal failure.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Non-success outcome kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed, incomplete, or invalid input.
    BadRequest,
    /// Caller identity missing or unparsable.
    Unauthorized,
    /// Caller authenticated but not permitted for the target record.
    Forbidden,
    /// No record for the given key.
    NotFound,
    /// Uniqueness violation on create.
    Conflict,
    /// Everything else, including downstream and I/O failures.
    Internal,
}

impl ErrorKind {
    /// All kinds, in status-code order.
    pub const ALL: [Self; 6] = [
        Self::BadRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::Conflict,
        Self::Internal,
    ];

    /// HTTP status code bound to this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-success outcome: kind, caller-facing message, and optional
/// diagnostic detail.
///
/// `detail` is only ever logged. It is skipped during serialization so
/// internal failure causes never reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Rejection {
    #[serde(skip)]
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip)]
    pub detail: Option<String>,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Internal failure: the caller sees only [`INTERNAL_MESSAGE`], the
    /// detail is kept for logs.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: INTERNAL_MESSAGE.to_string(),
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

/// Final result of one request.
pub type Outcome<T> = Result<T, Rejection>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_has_a_distinct_status() {
        let mut codes: Vec<u16> = ErrorKind::ALL.iter().map(|k| k.status_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes, vec![400, 401, 403, 404, 409, 500]);
    }

    #[test]
    fn internal_hides_detail_from_body() {
        let rejection = Rejection::internal("connection refused: 10.0.0.3:5432");
        let body = serde_json::to_value(&rejection).unwrap();
        assert_eq!(body, serde_json::json!({ "error": INTERNAL_MESSAGE }));
        assert_eq!(
            rejection.detail.as_deref(),
            Some("connection refused: 10.0.0.3:5432")
        );
    }

    #[test]
    fn body_is_error_object() {
        let body = serde_json::to_value(Rejection::conflict("duplicate email")).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "duplicate email" }));
    }
}
