//! Record families served by the Rally services.

pub mod auth;
pub mod game;
pub mod user;

pub use auth::{normalize_email, AuthCredential, AuthDraft, AuthPatch, LoginBody};
pub use game::{MatchDraft, MatchFilter, MatchPatch, MatchRecord, MatchStatus};
pub use user::{UserDraft, UserFilter, UserPatch, UserProfile};
