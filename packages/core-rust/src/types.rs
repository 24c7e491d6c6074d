use serde::{Deserialize, Serialize};

/// Authenticated caller identity, taken from the `sub` and `email` claims of
/// the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Auth subject id (the credential's UUID, as a string).
    pub id: String,
    /// Email the credential was registered with, when the token carries it.
    pub email: Option<String>,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}
