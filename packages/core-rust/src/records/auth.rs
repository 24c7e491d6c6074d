use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::Entity;
use crate::validation::{Checks, Validate, ValidationResult};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

/// Lowercases and trims an email so it can serve as a credential key.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Login credential, keyed by normalized email.
///
/// `id` is the subject every issued token is bound to. The password hash is
/// a PHC string and never leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCredential {
    pub email: String,
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Registration payload and create staging.
///
/// Everything except `email` and `password` is server-controlled and filled
/// in by pre-create hooks.
#[derive(Clone, Default, Deserialize)]
pub struct AuthDraft {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub id: Uuid,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub created_at: u64,
    #[serde(skip)]
    pub updated_at: u64,
}

impl std::fmt::Debug for AuthDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDraft")
            .field("email", &self.email)
            .field("id", &self.id)
            .field("hashed", &self.password_hash.is_some())
            .finish_non_exhaustive()
    }
}

impl Validate for AuthDraft {
    fn validate(&self) -> ValidationResult {
        Checks::new()
            .email("email", &self.email)
            .length_between("password", &self.password, PASSWORD_MIN, PASSWORD_MAX)
            .finish()
    }
}

/// Password change payload and update staging.
#[derive(Clone, Default, Deserialize)]
pub struct AuthPatch {
    pub password: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub updated_at: u64,
}

impl std::fmt::Debug for AuthPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPatch")
            .field("hashed", &self.password_hash.is_some())
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl Validate for AuthPatch {
    fn validate(&self) -> ValidationResult {
        Checks::new()
            .length_between("password", &self.password, PASSWORD_MIN, PASSWORD_MAX)
            .finish()
    }
}

/// Login payload.
#[derive(Clone, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginBody")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Validate for LoginBody {
    fn validate(&self) -> ValidationResult {
        Checks::new()
            .email("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

impl Entity for AuthCredential {
    type Key = String;
    type Draft = AuthDraft;
    type Patch = AuthPatch;
    type Filter = ();

    const KIND: &'static str = "auth credential";
    const KEY_FIELD: &'static str = "email";

    fn key(&self) -> &String {
        &self.email
    }

    fn draft_key(draft: &AuthDraft) -> Option<String> {
        Some(draft.email.clone())
    }

    fn materialize(email: String, draft: AuthDraft) -> Self {
        Self {
            email,
            id: draft.id,
            password_hash: draft.password_hash.unwrap_or_default(),
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        }
    }

    fn apply(&mut self, patch: AuthPatch) -> Result<(), String> {
        if let Some(hash) = patch.password_hash {
            self.password_hash = hash;
        }
        self.updated_at = patch.updated_at;
        Ok(())
    }

    fn owner(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn hash_is_never_serialized() {
        let cred = AuthCredential {
            email: "ada@example.com".to_string(),
            id: Uuid::nil(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        let body = serde_json::to_value(&cred).unwrap();
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["email"], "ada@example.com");
    }

    #[test]
    fn payload_cannot_set_server_fields() {
        let draft: AuthDraft = serde_json::from_str(
            r#"{"email":"a@b.io","password":"hunter22!","id":"00000000-0000-0000-0000-00000000abcd","password_hash":"x"}"#,
        )
        .unwrap();
        assert_eq!(draft.id, Uuid::nil());
        assert!(draft.password_hash.is_none());
    }

    #[test]
    fn short_password_is_invalid() {
        let draft = AuthDraft {
            email: "a@b.io".to_string(),
            password: "short".to_string(),
            ..AuthDraft::default()
        };
        assert!(!draft.validate().is_valid());
    }

    #[test]
    fn patch_without_hash_keeps_password() {
        let mut cred = AuthCredential::materialize(
            "a@b.io".to_string(),
            AuthDraft {
                password_hash: Some("old".to_string()),
                ..AuthDraft::default()
            },
        );
        cred.apply(AuthPatch {
            updated_at: 9,
            ..AuthPatch::default()
        })
        .unwrap();
        assert_eq!(cred.password_hash, "old");
        assert_eq!(cred.updated_at, 9);
    }
}
