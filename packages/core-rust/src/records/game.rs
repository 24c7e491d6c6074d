use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::Entity;
use crate::validation::{Checks, Validate, ValidationResult};

const TITLE_MAX: usize = 128;
const SCORE_MAX: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// A played or scheduled match between two or more users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    /// Auth subject that recorded the match.
    pub owner_id: Uuid,
    pub title: String,
    /// User profile ids.
    pub players: Vec<i64>,
    pub winner: Option<i64>,
    pub score: Option<String>,
    pub status: MatchStatus,
    pub played_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchDraft {
    pub title: String,
    pub players: Vec<i64>,
    #[serde(default)]
    pub winner: Option<i64>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub played_at: Option<u64>,
    #[serde(skip)]
    pub id: Option<Uuid>,
    #[serde(skip)]
    pub owner_id: Uuid,
    #[serde(skip)]
    pub created_at: u64,
    #[serde(skip)]
    pub updated_at: u64,
}

impl Validate for MatchDraft {
    fn validate(&self) -> ValidationResult {
        let distinct: HashSet<i64> = self.players.iter().copied().collect();
        let mut checks = Checks::new();
        checks
            .required("title", &self.title)
            .max_chars("title", &self.title, TITLE_MAX)
            .check(self.players.len() >= 2, || {
                "players must list at least two users".to_string()
            })
            .check(distinct.len() == self.players.len(), || {
                "players must not repeat".to_string()
            })
            .check(self.players.iter().all(|p| *p > 0), || {
                "players must be positive user ids".to_string()
            })
            .check(self.winner.is_none_or(|w| distinct.contains(&w)), || {
                "winner must be one of the players".to_string()
            });
        if let Some(score) = &self.score {
            checks.max_chars("score", score, SCORE_MAX);
        }
        checks.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub winner: Option<i64>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub status: Option<MatchStatus>,
    #[serde(default)]
    pub played_at: Option<u64>,
    #[serde(skip)]
    pub updated_at: u64,
}

impl Validate for MatchPatch {
    fn validate(&self) -> ValidationResult {
        let mut checks = Checks::new();
        if let Some(title) = &self.title {
            checks.required("title", title).max_chars("title", title, TITLE_MAX);
        }
        if let Some(score) = &self.score {
            checks.max_chars("score", score, SCORE_MAX);
        }
        checks.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchFilter {
    #[serde(default)]
    pub player: Option<i64>,
    #[serde(default)]
    pub status: Option<MatchStatus>,
}

impl Entity for MatchRecord {
    type Key = Uuid;
    type Draft = MatchDraft;
    type Patch = MatchPatch;
    type Filter = MatchFilter;

    const KIND: &'static str = "match";

    fn key(&self) -> &Uuid {
        &self.id
    }

    fn draft_key(draft: &MatchDraft) -> Option<Uuid> {
        draft.id
    }

    fn materialize(id: Uuid, draft: MatchDraft) -> Self {
        Self {
            id,
            owner_id: draft.owner_id,
            title: draft.title.trim().to_string(),
            players: draft.players,
            winner: draft.winner,
            score: draft.score,
            status: draft.status,
            played_at: draft.played_at,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
        }
    }

    fn apply(&mut self, patch: MatchPatch) -> Result<(), String> {
        if let Some(winner) = patch.winner.filter(|w| !self.players.contains(w)) {
            return Err(format!("winner: {winner} is not one of the players"));
        }
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(winner) = patch.winner {
            self.winner = Some(winner);
        }
        if let Some(score) = patch.score {
            self.score = Some(score);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(played_at) = patch.played_at {
            self.played_at = Some(played_at);
        }
        self.updated_at = patch.updated_at;
        Ok(())
    }

    fn matches(&self, filter: &MatchFilter) -> bool {
        filter.player.is_none_or(|p| self.players.contains(&p))
            && filter.status.is_none_or(|s| s == self.status)
    }

    fn owner(&self) -> Option<String> {
        Some(self.owner_id.to_string())
    }
}
