use crate::types::Principal;

/// Per-request context carrying caller identity and tracing information.
/// Threaded through every engine operation and handed to each hook.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Value of the `x-request-id` header assigned at the HTTP edge.
    pub request_id: String,
    /// Authenticated principal, if the request carried a parsable bearer token.
    pub principal: Option<Principal>,
}

impl RequestContext {
    /// Context for an anonymous caller.
    #[must_use]
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            principal: None,
        }
    }

    /// Context for an authenticated caller.
    #[must_use]
    pub fn authenticated(request_id: impl Into<String>, principal: Principal) -> Self {
        Self {
            request_id: request_id.into(),
            principal: Some(principal),
        }
    }
}
