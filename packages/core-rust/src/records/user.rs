use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::Entity;
use crate::validation::{Checks, Validate, ValidationResult};

const NAME_MAX: usize = 64;
const BIO_MAX: usize = 512;

/// Public player profile. One profile per auth subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub auth_id: Uuid,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDraft {
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(skip)]
    pub auth_id: Uuid,
    #[serde(skip)]
    pub created_at: u64,
    #[serde(skip)]
    pub updated_at: u64,
}

impl Validate for UserDraft {
    fn validate(&self) -> ValidationResult {
        let mut checks = Checks::new();
        checks
            .required("display_name", &self.display_name)
            .max_chars("display_name", &self.display_name, NAME_MAX)
            .max_chars("bio", &self.bio, BIO_MAX);
        if let Some(url) = &self.avatar_url {
            checks.url("avatar_url", url);
        }
        checks.finish()
    }
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(skip)]
    pub updated_at: u64,
}

impl Validate for UserPatch {
    fn validate(&self) -> ValidationResult {
        let mut checks = Checks::new();
        if let Some(name) = &self.display_name {
            checks
                .required("display_name", name)
                .max_chars("display_name", name, NAME_MAX);
        }
        if let Some(bio) = &self.bio {
            checks.max_chars("bio", bio, BIO_MAX);
        }
        if let Some(url) = &self.avatar_url {
            checks.url("avatar_url", url);
        }
        checks.finish()
    }
}

/// List filter, taken from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// Case-insensitive substring of `display_name`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub auth_id: Option<Uuid>,
}

impl Entity for UserProfile {
    type Key = i64;
    type Draft = UserDraft;
    type Patch = UserPatch;
    type Filter = UserFilter;

    const KIND: &'static str = "user";
    const UNIQUE_FIELD: &'static str = "auth_id";

    fn key(&self) -> &i64 {
        &self.id
    }

    fn draft_key(_draft: &UserDraft) -> Option<i64> {
        None
    }

    fn materialize(id: i64, draft: UserDraft) -> Self {
        Self {
            id,
            auth_id: draft.auth_id,
            display_name: draft.display_name.trim().to_string(),
            bio: draft.bio,
            avatar_url: draft.avatar_url,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        }
    }

    fn apply(&mut self, patch: UserPatch) -> Result<(), String> {
        if let Some(name) = patch.display_name {
            self.display_name = name.trim().to_string();
        }
        if let Some(bio) = patch.bio {
            self.bio = bio;
        }
        if let Some(url) = patch.avatar_url {
            self.avatar_url = Some(url);
        }
        self.updated_at = patch.updated_at;
        Ok(())
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        let name_ok = filter.name.as_ref().is_none_or(|needle| {
            self.display_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let owner_ok = filter.auth_id.is_none_or(|id| id == self.auth_id);
        name_ok && owner_ok
    }

    fn owner(&self) -> Option<String> {
        Some(self.auth_id.to_string())
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.auth_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> UserProfile {
        UserProfile::materialize(
            1,
            UserDraft {
                display_name: name.to_string(),
                auth_id: Uuid::from_u128(7),
                ..UserDraft::default()
            },
        )
    }

    #[test]
    fn filter_by_name_is_case_insensitive() {
        let user = profile("Grand Master Flash");
        let filter = UserFilter {
            name: Some("master".to_string()),
            auth_id: None,
        };
        assert!(user.matches(&filter));
        assert!(!user.matches(&UserFilter {
            name: Some("novice".to_string()),
            auth_id: None,
        }));
    }

    #[test]
    fn empty_filter_matches_all() {
        assert!(profile("x").matches(&UserFilter::default()));
    }

    #[test]
    fn patch_leaves_absent_fields() {
        let mut user = profile("ada");
        user.apply(UserPatch {
            bio: Some("plays chess".to_string()),
            updated_at: 50,
            ..UserPatch::default()
        })
        .unwrap();
        assert_eq!(user.display_name, "ada");
        assert_eq!(user.bio, "plays chess");
        assert_eq!(user.updated_at, 50);
    }

    #[test]
    fn rejects_blank_name_and_bad_avatar() {
        let draft = UserDraft {
            display_name: "  ".to_string(),
            avatar_url: Some("ftp://x".to_string()),
            ..UserDraft::default()
        };
        let result = draft.validate();
        assert_eq!(
            result.message().as_deref(),
            Some("display_name is required; avatar_url must be an http(s) URL")
        );
    }
}
