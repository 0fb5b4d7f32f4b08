//! In-memory `Database` for tests and ephemeral runs.
//!
//! Failure switches let callers exercise the best-effort stage saves and
//! the all-or-nothing completion commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::assessment::{Answers, Session};
use crate::error::DatabaseError;
use crate::profile::Profile;
use crate::program::{Program, UserStats};
use crate::rewards::PointReward;
use crate::store::traits::{CompletionCommit, Database, SavedSchedule};

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    stage_answers: HashMap<(String, u8), Answers>,
    profiles: HashMap<String, Profile>,
    programs: HashMap<String, Program>,
    stats: HashMap<String, UserStats>,
    point_rewards: HashMap<String, Vec<PointReward>>,
    schedules: HashMap<String, SavedSchedule>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    state: RwLock<State>,
    fail_stage_saves: AtomicBool,
    fail_completion: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `save_session` and `save_stage` fail until reset.
    pub fn set_fail_stage_saves(&self, fail: bool) {
        self.fail_stage_saves.store(fail, Ordering::SeqCst);
    }

    /// Make `commit_completion` fail until reset.
    pub fn set_fail_completion(&self, fail: bool) {
        self.fail_completion.store(fail, Ordering::SeqCst);
    }

    fn check_stage_saves(&self) -> Result<(), DatabaseError> {
        if self.fail_stage_saves.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("injected stage save failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError> {
        self.check_stage_saves()?;
        let mut state = self.state.write().await;
        state
            .sessions
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn save_stage(
        &self,
        session: &Session,
        stage: u8,
        partial: &Answers,
    ) -> Result<(), DatabaseError> {
        self.check_stage_saves()?;
        let mut state = self.state.write().await;
        state
            .stage_answers
            .insert((session.user_id.clone(), stage), partial.clone());
        state
            .sessions
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        Ok(self.state.read().await.sessions.get(user_id).cloned())
    }

    async fn get_stage_answers(
        &self,
        user_id: &str,
        stage: u8,
    ) -> Result<Option<Answers>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .stage_answers
            .get(&(user_id.to_string(), stage))
            .cloned())
    }

    async fn commit_completion(&self, commit: &CompletionCommit) -> Result<(), DatabaseError> {
        if self.fail_completion.load(Ordering::SeqCst) {
            return Err(DatabaseError::Transaction(
                "injected completion failure".into(),
            ));
        }

        // All checks happen before the first write.
        let mut state = self.state.write().await;
        let user_id = commit.user_id.clone();
        match state.sessions.get(&user_id) {
            Some(session) if session.completed_at.is_none() => {}
            _ => {
                return Err(DatabaseError::NotFound {
                    entity: "open session".to_string(),
                    id: user_id,
                });
            }
        }
        if state.profiles.contains_key(&user_id) {
            return Err(DatabaseError::Constraint(format!(
                "profile already exists for {user_id}"
            )));
        }

        state
            .profiles
            .insert(user_id.clone(), commit.profile.clone());
        state
            .programs
            .insert(user_id.clone(), commit.program.clone());
        state.stats.insert(user_id.clone(), commit.stats.clone());

        let rewards = state.point_rewards.entry(user_id.clone()).or_default();
        for reward in &commit.point_rewards {
            if !rewards.iter().any(|r| r.title == reward.title) {
                rewards.push(reward.clone());
            }
        }
        rewards.sort_by_key(|r| r.points_required);

        if let Some(session) = state.sessions.get_mut(&user_id) {
            session.answers = commit.answers.clone();
            session.completed_at = Some(commit.completed_at);
        }
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn get_program(&self, user_id: &str) -> Result<Option<Program>, DatabaseError> {
        Ok(self.state.read().await.programs.get(user_id).cloned())
    }

    async fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>, DatabaseError> {
        Ok(self.state.read().await.stats.get(user_id).cloned())
    }

    async fn list_point_rewards(&self, user_id: &str) -> Result<Vec<PointReward>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .point_rewards
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_reward_schedule(
        &self,
        user_id: &str,
        saved: &SavedSchedule,
    ) -> Result<(), DatabaseError> {
        self.state
            .write()
            .await
            .schedules
            .insert(user_id.to_string(), saved.clone());
        Ok(())
    }

    async fn get_reward_schedule(
        &self,
        user_id: &str,
    ) -> Result<Option<SavedSchedule>, DatabaseError> {
        Ok(self.state.read().await.schedules.get(user_id).cloned())
    }
}
