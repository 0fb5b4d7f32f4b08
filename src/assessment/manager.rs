//! AssessmentManager: per-user stage engines, resumed from the store on
//! first touch, plus the reward schedule operations that sit beside them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{DatabaseError, Result};
use crate::profile::Profile;
use crate::rewards::{
    PersonalizationInput, RewardCatalog, RewardScheduler, RngSource, ScheduledReward,
};
use crate::store::{Database, SavedSchedule};

use super::answers::Answers;
use super::engine::{CompletionOutcome, StageEngine};
use super::stage::{TERMINAL_STAGE, stage};

/// Snapshot of a user's assessment.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentStatus {
    pub user_id: String,
    pub current_stage: u8,
    pub stage_name: &'static str,
    pub terminal_stage: u8,
    pub completed: bool,
    pub capture_running: bool,
    pub answers: Answers,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AssessmentStatus {
    fn of(engine: &StageEngine) -> Self {
        let session = engine.session();
        Self {
            user_id: session.user_id.clone(),
            current_stage: session.current_stage,
            stage_name: stage(session.current_stage).map_or("unknown", |s| s.name),
            terminal_stage: TERMINAL_STAGE,
            completed: session.is_completed(),
            capture_running: engine.capture_running(),
            answers: session.answers.clone(),
            started_at: session.started_at,
            completed_at: session.completed_at,
        }
    }
}

/// A stored schedule with the slots unlocked at a task count.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    #[serde(flatten)]
    pub saved: SavedSchedule,
    pub completed_tasks: u32,
    pub eligible: Vec<ScheduledReward>,
}

pub struct AssessmentManager {
    db: Arc<dyn Database>,
    engines: RwLock<HashMap<String, Arc<Mutex<StageEngine>>>>,
    rng: Mutex<RngSource<StdRng>>,
}

impl AssessmentManager {
    /// `rng_seed` makes reward draws reproducible.
    pub fn new(db: Arc<dyn Database>, rng_seed: Option<u64>) -> Self {
        let rng = match rng_seed {
            Some(seed) => RngSource::seeded(seed),
            None => RngSource::from_entropy(),
        };
        Self {
            db,
            engines: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// The engine for `user_id`: cached, reloaded from the store, or new.
    /// Only open sessions are cached; a completed one is served from the
    /// store each time.
    pub async fn resume(&self, user_id: &str) -> Result<Arc<Mutex<StageEngine>>> {
        if let Some(engine) = self.engines.read().await.get(user_id) {
            return Ok(engine.clone());
        }

        let engine = match self.db.load_session(user_id).await? {
            Some(session) if session.is_completed() => {
                return Ok(Arc::new(Mutex::new(StageEngine::new(
                    session,
                    self.db.clone(),
                ))));
            }
            Some(session) => {
                info!(user_id, stage = session.current_stage, "Assessment resumed");
                StageEngine::new(session, self.db.clone())
            }
            None => StageEngine::start(user_id, self.db.clone()).await,
        };

        let mut engines = self.engines.write().await;
        // Another request may have loaded it meanwhile.
        let entry = engines
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(engine)));
        Ok(entry.clone())
    }

    pub async fn status(&self, user_id: &str) -> Result<AssessmentStatus> {
        let engine = self.resume(user_id).await?;
        let engine = engine.lock().await;
        Ok(AssessmentStatus::of(&engine))
    }

    pub async fn advance(&self, user_id: &str, partial: Answers) -> Result<AssessmentStatus> {
        let engine = self.resume(user_id).await?;
        let mut engine = engine.lock().await;
        engine.advance(partial).await?;
        Ok(AssessmentStatus::of(&engine))
    }

    pub async fn go_back(&self, user_id: &str) -> Result<AssessmentStatus> {
        let engine = self.resume(user_id).await?;
        let mut engine = engine.lock().await;
        engine.go_back().await?;
        Ok(AssessmentStatus::of(&engine))
    }

    pub async fn record_input(&self, user_id: &str, text: &str) -> Result<AssessmentStatus> {
        let engine = self.resume(user_id).await?;
        let mut engine = engine.lock().await;
        engine.record_input(text)?;
        Ok(AssessmentStatus::of(&engine))
    }

    pub async fn complete(&self, user_id: &str) -> Result<CompletionOutcome> {
        let engine = self.resume(user_id).await?;
        let outcome = engine.lock().await.complete().await?;
        self.engines.write().await.remove(user_id);
        debug!(user_id, "Engine released after completion");
        Ok(outcome)
    }

    /// Number of open sessions held in memory.
    pub async fn active_sessions(&self) -> usize {
        self.engines.read().await.len()
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.db.get_profile(user_id).await?)
    }

    // ── Reward schedules ────────────────────────────────────────────

    /// Build a catalog from `input`, draw a fresh schedule and store it.
    pub async fn generate_schedule(
        &self,
        user_id: &str,
        input: PersonalizationInput,
    ) -> Result<SavedSchedule> {
        let catalog = RewardCatalog::personalized(&input);
        let schedule = {
            let mut rng = self.rng.lock().await;
            RewardScheduler::new(&catalog, &mut *rng).generate()?
        };

        let saved = SavedSchedule {
            personalization: input,
            schedule,
            generated_at: Utc::now(),
        };
        self.db.save_reward_schedule(user_id, &saved).await?;
        info!(user_id, slots = saved.schedule.len(), "Reward schedule generated");
        Ok(saved)
    }

    /// Redraw the rewards in the stored schedule, keeping its triggers.
    pub async fn regenerate_schedule(&self, user_id: &str) -> Result<SavedSchedule> {
        let mut saved = self
            .db
            .get_reward_schedule(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "reward schedule".to_string(),
                id: user_id.to_string(),
            })?;

        let catalog = RewardCatalog::personalized(&saved.personalization);
        {
            let mut rng = self.rng.lock().await;
            RewardScheduler::new(&catalog, &mut *rng).regenerate(&mut saved.schedule)?;
        }
        saved.schedule.verify(&catalog)?;
        saved.generated_at = Utc::now();

        self.db.save_reward_schedule(user_id, &saved).await?;
        info!(user_id, "Reward schedule regenerated");
        Ok(saved)
    }

    /// The stored schedule and the slots unlocked at `completed_tasks`.
    pub async fn schedule(&self, user_id: &str, completed_tasks: u32) -> Result<Option<ScheduleView>> {
        let Some(saved) = self.db.get_reward_schedule(user_id).await? else {
            return Ok(None);
        };
        let eligible = saved
            .schedule
            .eligible(completed_tasks)
            .into_iter()
            .cloned()
            .collect();
        Ok(Some(ScheduleView {
            saved,
            completed_tasks,
            eligible,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, Error, ValidationError};
    use crate::rewards::RewardTier;
    use crate::store::{InMemoryDatabase, LibSqlBackend};

    fn manager() -> AssessmentManager {
        AssessmentManager::new(Arc::new(InMemoryDatabase::new()), Some(7))
    }

    #[tokio::test]
    async fn status_starts_new_session() {
        let mgr = manager();
        let status = mgr.status("u1").await.unwrap();
        assert_eq!(status.current_stage, 1);
        assert_eq!(status.stage_name, "baseline_anxiety");
        assert!(!status.completed);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let mgr = manager();
        mgr.advance(
            "u1",
            Answers {
                baseline_anxiety: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(mgr.status("u1").await.unwrap().current_stage, 2);
        assert_eq!(mgr.status("u2").await.unwrap().current_stage, 1);
    }

    #[tokio::test]
    async fn validation_error_surfaces() {
        let mgr = manager();
        let err = mgr.advance("u1", Answers::default()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField { stage: 1, .. })
        ));
    }

    #[tokio::test]
    async fn resume_reloads_from_store() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        {
            let mgr = AssessmentManager::new(db.clone(), None);
            mgr.advance(
                "u1",
                Answers {
                    baseline_anxiety: Some(6),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let mgr = AssessmentManager::new(db, None);
        let status = mgr.status("u1").await.unwrap();
        assert_eq!(status.current_stage, 2);
        assert_eq!(status.answers.baseline_anxiety, Some(6));
    }

    #[tokio::test]
    async fn profile_absent_until_complete() {
        let mgr = manager();
        assert!(mgr.profile("u1").await.unwrap().is_none());
        assert!(matches!(
            mgr.complete("u1").await,
            Err(Error::Completion(_))
        ));
    }

    #[tokio::test]
    async fn schedule_generate_regenerate_view() {
        let mgr = manager();
        assert!(mgr.schedule("u1", 0).await.unwrap().is_none());

        let input = PersonalizationInput {
            enjoyable_activities: vec!["Painting".into()],
            mood_boosters: vec!["Cycling".into()],
            ..Default::default()
        };
        let first = mgr.generate_schedule("u1", input.clone()).await.unwrap();
        assert_eq!(first.schedule.len(), 14);

        let second = mgr.regenerate_schedule("u1").await.unwrap();
        assert_eq!(second.personalization, input);
        for tier in RewardTier::ALL {
            assert_eq!(second.schedule.triggers(tier), first.schedule.triggers(tier));
        }

        let view = mgr.schedule("u1", 4).await.unwrap().unwrap();
        assert_eq!(view.eligible.len(), 4);
        assert_eq!(view.saved.schedule, second.schedule);
    }

    #[tokio::test]
    async fn completed_sessions_leave_the_registry() {
        let db = Arc::new(InMemoryDatabase::new());
        let mgr = AssessmentManager::new(db.clone(), Some(7));
        mgr.status("other").await.unwrap();

        // Park "u1" on the terminal stage with every answer filled.
        let mut session = crate::assessment::Session::new("u1");
        session.current_stage = TERMINAL_STAGE;
        session.answers = Answers {
            first_action: Some("Open the doc".into()),
            second_action: Some("Write a heading".into()),
            third_action: Some("Write a paragraph".into()),
            completion_attempted: Some(true),
            resistance_level: Some(3),
            ..Default::default()
        };
        db.save_session(&session).await.unwrap();

        mgr.status("u1").await.unwrap();
        assert_eq!(mgr.active_sessions().await, 2);

        mgr.complete("u1").await.unwrap();
        assert_eq!(mgr.active_sessions().await, 1);

        // Reads of a completed session do not re-register it.
        let status = mgr.status("u1").await.unwrap();
        assert!(status.completed);
        assert_eq!(mgr.active_sessions().await, 1);
        assert!(matches!(
            mgr.complete("u1").await,
            Err(Error::Completion(CompletionError::AlreadyCompleted { .. }))
        ));
        assert_eq!(mgr.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn regenerate_without_schedule_is_not_found() {
        let mgr = manager();
        assert!(matches!(
            mgr.regenerate_schedule("u1").await,
            Err(Error::Database(DatabaseError::NotFound { .. }))
        ));
    }
}
