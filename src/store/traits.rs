//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::{Answers, Session};
use crate::error::DatabaseError;
use crate::profile::Profile;
use crate::program::{Program, UserStats};
use crate::rewards::{PersonalizationInput, PointReward, RewardSchedule};

/// Everything the completion step writes, committed all-or-nothing.
#[derive(Debug, Clone)]
pub struct CompletionCommit {
    pub user_id: String,
    pub answers: Answers,
    pub profile: Profile,
    pub program: Program,
    pub stats: UserStats,
    pub point_rewards: Vec<PointReward>,
    pub completed_at: DateTime<Utc>,
}

/// A stored reward schedule with the input its catalog was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSchedule {
    pub personalization: PersonalizationInput,
    pub schedule: RewardSchedule,
    pub generated_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering sessions, completion artifacts
/// and reward schedules.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Upsert the session row (stage, merged answers, timestamps).
    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Record the partial answers submitted for `stage` and the session's
    /// new position. Replaying the same stage overwrites the earlier write.
    async fn save_stage(
        &self,
        session: &Session,
        stage: u8,
        partial: &Answers,
    ) -> Result<(), DatabaseError>;

    /// Load a user's session, if one was ever saved.
    async fn load_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Partial answers recorded for one stage.
    async fn get_stage_answers(
        &self,
        user_id: &str,
        stage: u8,
    ) -> Result<Option<Answers>, DatabaseError>;

    // ── Completion ──────────────────────────────────────────────────

    /// Atomically write profile, program, stats and starter rewards and
    /// mark the session completed. On error nothing is written.
    async fn commit_completion(&self, commit: &CompletionCommit) -> Result<(), DatabaseError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    async fn get_program(&self, user_id: &str) -> Result<Option<Program>, DatabaseError>;

    async fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>, DatabaseError>;

    /// Starter rewards, ascending by points required.
    async fn list_point_rewards(&self, user_id: &str) -> Result<Vec<PointReward>, DatabaseError>;

    // ── Reward schedules ────────────────────────────────────────────

    /// Replace the user's stored schedule.
    async fn save_reward_schedule(
        &self,
        user_id: &str,
        saved: &SavedSchedule,
    ) -> Result<(), DatabaseError>;

    async fn get_reward_schedule(
        &self,
        user_id: &str,
    ) -> Result<Option<SavedSchedule>, DatabaseError>;
}
