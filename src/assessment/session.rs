//! Assessment session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answers::Answers;
use super::stage::FIRST_STAGE;

/// One user's assessment run. Immutable once `completed_at` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub current_stage: u8,
    pub answers: Answers,
    /// Stages left by `advance`, most recent last. `go_back` pops it.
    #[serde(default)]
    pub history: Vec<u8>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Start a fresh session at the first stage.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_stage: FIRST_STAGE,
            answers: Answers::default(),
            history: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
