//! Stage engine: drives one user's session through the stage table.
//!
//! Interim stage writes are best-effort. A failed write is logged and the
//! user still moves forward. The completion step is the opposite: classify,
//! synthesize and seed are committed as one unit, and on any failure the
//! session stays open with its answers intact so the call can be retried.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CompletionError, ValidationError};
use crate::profile::{Profile, classify};
use crate::program::{Program, UserStats, starting_stats, synthesize};
use crate::rewards::{PointReward, initial_point_rewards};
use crate::store::{CompletionCommit, Database};

use super::answers::Answers;
use super::session::Session;
use super::stage::{
    BranchTable, CAPTURE_STAGE, FIRST_STAGE, TERMINAL_STAGE, is_terminal, validate_stage,
};

/// Artifacts produced by a successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub profile: Profile,
    pub program: Program,
    pub stats: UserStats,
    pub point_rewards: Vec<PointReward>,
}

pub struct StageEngine {
    session: Session,
    db: Arc<dyn Database>,
    branches: BranchTable,
    /// Set by the first non-blank input on the capture stage.
    capture_started: Option<Instant>,
}

impl StageEngine {
    /// Wrap an existing (possibly resumed) session.
    pub fn new(session: Session, db: Arc<dyn Database>) -> Self {
        Self {
            session,
            db,
            branches: BranchTable::default(),
            capture_started: None,
        }
    }

    /// Start a fresh session for `user_id` and persist it (best-effort).
    pub async fn start(user_id: &str, db: Arc<dyn Database>) -> Self {
        let engine = Self::new(Session::new(user_id), db);
        if let Err(e) = engine.db.save_session(&engine.session).await {
            warn!(user_id, error = %e, "Failed to persist new session");
        }
        info!(user_id, "Assessment started");
        engine
    }

    pub fn with_branches(mut self, branches: BranchTable) -> Self {
        self.branches = branches;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_stage(&self) -> u8 {
        self.session.current_stage
    }

    pub fn answers(&self) -> &Answers {
        &self.session.answers
    }

    /// Whether the capture timer is running.
    pub fn capture_running(&self) -> bool {
        self.capture_started.is_some()
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.session.is_completed() {
            return Err(ValidationError::SessionCompleted {
                user_id: self.session.user_id.clone(),
            });
        }
        Ok(())
    }

    /// Submit the current stage.
    ///
    /// Required fields are checked against the answers as they would be
    /// after the merge, so values kept from an earlier visit count. On
    /// failure nothing changes. Returns the new current stage.
    pub async fn advance(&mut self, mut partial: Answers) -> Result<u8, ValidationError> {
        self.ensure_open()?;
        partial.validate_ranges()?;
        // Only the capture timer writes this.
        partial.accomplishment_capture_millis = None;

        let stage = self.session.current_stage;
        let mut merged = self.session.answers.clone();
        merged.merge(partial.clone());
        validate_stage(stage, &merged)?;

        if stage == CAPTURE_STAGE {
            if let Some(started) = self.capture_started.take() {
                let millis = started.elapsed().as_millis() as u64;
                partial.accomplishment_capture_millis = Some(millis);
                merged.accomplishment_capture_millis = Some(millis);
                debug!(user_id = %self.session.user_id, millis, "Capture timer stopped");
            }
        }

        let next_stage = self.branches.next_stage(stage, &merged);
        self.session.answers = merged;
        self.session.current_stage = next_stage;
        if next_stage != stage {
            self.session.history.push(stage);
        }

        if let Err(e) = self.db.save_stage(&self.session, stage, &partial).await {
            warn!(
                user_id = %self.session.user_id,
                stage,
                error = %e,
                "Stage save failed, continuing"
            );
        }

        info!(user_id = %self.session.user_id, stage, next_stage, "Stage advanced");
        Ok(next_stage)
    }

    /// Return to the stage this one was reached from, keeping every
    /// answer. Skipped stages are skipped again. No-op on the first stage.
    pub async fn go_back(&mut self) -> Result<u8, ValidationError> {
        self.ensure_open()?;
        let stage = self.session.current_stage;
        let previous = match self.session.history.pop() {
            Some(previous) => previous,
            None if stage > FIRST_STAGE => stage - 1,
            None => return Ok(FIRST_STAGE),
        };

        self.session.current_stage = previous;
        if let Err(e) = self.db.save_session(&self.session).await {
            warn!(user_id = %self.session.user_id, error = %e, "Session save failed, continuing");
        }
        debug!(user_id = %self.session.user_id, from = stage, to = previous, "Stage back");
        Ok(previous)
    }

    /// Note a keystroke on the capture stage. The first non-blank input
    /// starts the timer; later inputs and other stages are ignored.
    /// Returns whether the timer is running.
    pub fn record_input(&mut self, text: &str) -> Result<bool, ValidationError> {
        self.ensure_open()?;
        if self.session.current_stage == CAPTURE_STAGE
            && self.capture_started.is_none()
            && !text.trim().is_empty()
        {
            self.capture_started = Some(Instant::now());
            debug!(user_id = %self.session.user_id, "Capture timer started");
        }
        Ok(self.capture_started.is_some())
    }

    /// Run the completion pipeline and commit it atomically.
    pub async fn complete(&mut self) -> Result<CompletionOutcome, CompletionError> {
        let user_id = self.session.user_id.clone();
        if self.session.is_completed() {
            return Err(CompletionError::AlreadyCompleted { user_id });
        }
        let stage = self.session.current_stage;
        if !is_terminal(stage) {
            return Err(CompletionError::NotAtTerminalStage {
                current: stage,
                terminal: TERMINAL_STAGE,
            });
        }
        validate_stage(stage, &self.session.answers).map_err(CompletionError::Incomplete)?;

        let answers = &self.session.answers;
        let profile = classify(answers);
        let program = synthesize(answers, &profile);
        let stats = starting_stats(&program);
        let point_rewards = initial_point_rewards(&user_id);
        let completed_at = Utc::now();

        let commit = CompletionCommit {
            user_id: user_id.clone(),
            answers: answers.clone(),
            profile,
            program,
            stats,
            point_rewards,
            completed_at,
        };

        if let Err(e) = self.db.commit_completion(&commit).await {
            warn!(user_id = %user_id, error = %e, "Completion commit failed");
            return Err(CompletionError::Commit(e));
        }

        self.session.completed_at = Some(completed_at);
        info!(
            user_id = %user_id,
            primary_type = %commit.profile.primary_type,
            success_probability = commit.profile.success_probability,
            "Assessment completed"
        );

        Ok(CompletionOutcome {
            profile: commit.profile,
            program: commit.program,
            stats: commit.stats,
            point_rewards: commit.point_rewards,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::assessment::answers::REWARD_PREFERENCE_LABELS;
    use crate::profile::{ComplexityTolerance, DopamineSensitivity, ProcrastinationLevel};
    use crate::store::{InMemoryDatabase, LibSqlBackend};

    fn memory_db() -> Arc<InMemoryDatabase> {
        Arc::new(InMemoryDatabase::new())
    }

    /// Answers that satisfy `stage`, matching the end-to-end scenario.
    fn stage_answers(stage: u8) -> Answers {
        let mut a = Answers::default();
        match stage {
            1 => a.baseline_anxiety = Some(9),
            2 => a.procrastination_frequency = Some("I've lost count".into()),
            3 => {
                a.accomplishments = Some(vec![
                    "Ran a half marathon".into(),
                    "Shipped v1".into(),
                    "Learned Spanish".into(),
                ])
            }
            4 => a.dopamine_response = Some(9),
            5 => a.trigger_type = Some("Projects that seem too complex".into()),
            6 => a.avoidance_pattern = Some("Research forever".into()),
            7 => a.work_environment = Some("Home office".into()),
            8 => a.motivation_style = Some("Deadlines".into()),
            9 => {
                a.reward_preferences = Some(
                    REWARD_PREFERENCE_LABELS
                        .iter()
                        .map(|l| (l.to_string(), 4))
                        .collect::<BTreeMap<_, _>>(),
                )
            }
            10 => a.session_length = Some("30-45 minutes".into()),
            11 => a.biggest_project = Some("Write the book".into()),
            12 => a.current_frustration = Some("Never starting".into()),
            13 => {
                a.biggest_success = Some("Finished a degree".into());
                a.success_factors = Some("Accountability".into());
            }
            14 => {
                a.first_action = Some("Outline chapter one".into());
                a.second_action = Some("Draft intro".into());
                a.third_action = Some("Email editor".into());
                a.completion_attempted = Some(true);
                a.resistance_level = Some(9);
            }
            _ => {}
        }
        a
    }

    async fn walk_to_terminal(engine: &mut StageEngine) {
        while !is_terminal(engine.current_stage()) {
            let stage = engine.current_stage();
            engine.advance(stage_answers(stage)).await.unwrap();
        }
        engine.advance(stage_answers(TERMINAL_STAGE)).await.unwrap();
    }

    #[tokio::test]
    async fn advance_moves_forward_and_persists() {
        let db = memory_db();
        let mut engine = StageEngine::start("u1", db.clone()).await;

        let next = engine.advance(stage_answers(1)).await.unwrap();
        assert_eq!(next, 2);
        assert_eq!(engine.answers().baseline_anxiety, Some(9));

        let stored = db.get_stage_answers("u1", 1).await.unwrap().unwrap();
        assert_eq!(stored.baseline_anxiety, Some(9));
        let loaded = db.load_session("u1").await.unwrap().unwrap();
        assert_eq!(loaded.current_stage, 2);
    }

    #[tokio::test]
    async fn missing_field_blocks_transition() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        let err = engine.advance(Answers::default()).await.unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                stage: 1,
                field: "baseline_anxiety"
            }
        );
        assert_eq!(engine.current_stage(), 1);
        assert_eq!(engine.answers(), &Answers::default());
    }

    #[tokio::test]
    async fn out_of_range_rejected() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        let err = engine
            .advance(Answers {
                baseline_anxiety: Some(11),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
        assert_eq!(engine.current_stage(), 1);
    }

    #[tokio::test]
    async fn go_back_preserves_answers() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        engine.advance(stage_answers(1)).await.unwrap();
        engine.advance(stage_answers(2)).await.unwrap();

        assert_eq!(engine.go_back().await.unwrap(), 2);
        assert_eq!(
            engine.answers().procrastination_frequency.as_deref(),
            Some("I've lost count")
        );
        // Re-entering with nothing new reuses the kept value.
        assert_eq!(engine.advance(Answers::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn go_back_on_first_stage_is_noop() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        assert_eq!(engine.go_back().await.unwrap(), FIRST_STAGE);
        assert_eq!(engine.current_stage(), FIRST_STAGE);
    }

    #[tokio::test]
    async fn boring_trigger_skips_avoidance_stage() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        for stage in 1..5 {
            engine.advance(stage_answers(stage)).await.unwrap();
        }
        let next = engine
            .advance(Answers {
                trigger_type: Some("Boring or repetitive tasks".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(next, 7);
    }

    #[tokio::test]
    async fn back_after_skip_returns_to_branch_stage() {
        let db = memory_db();
        let mut engine = StageEngine::start("u1", db.clone()).await;
        for stage in 1..5 {
            engine.advance(stage_answers(stage)).await.unwrap();
        }
        let boring = Answers {
            trigger_type: Some("Boring or repetitive tasks".into()),
            ..Default::default()
        };
        assert_eq!(engine.advance(boring).await.unwrap(), 7);

        assert_eq!(engine.go_back().await.unwrap(), 5);
        // Kept answers carry the user straight past the skipped stage again.
        assert_eq!(engine.advance(Answers::default()).await.unwrap(), 7);
        assert_eq!(engine.session().history, vec![1, 2, 3, 4, 5]);

        // The path survives a reload.
        let reloaded = db.load_session("u1").await.unwrap().unwrap();
        let mut resumed = StageEngine::new(reloaded, db);
        assert_eq!(resumed.go_back().await.unwrap(), 5);
        assert_eq!(resumed.go_back().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn linear_table_never_skips() {
        let mut engine =
            StageEngine::new(Session::new("u1"), memory_db()).with_branches(BranchTable::linear());
        for stage in 1..5 {
            engine.advance(stage_answers(stage)).await.unwrap();
        }
        let next = engine
            .advance(Answers {
                trigger_type: Some("Boring or repetitive tasks".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(next, 6);
    }

    #[tokio::test]
    async fn stage_save_failure_does_not_block() {
        let db = memory_db();
        let mut engine = StageEngine::start("u1", db.clone()).await;
        db.set_fail_stage_saves(true);

        assert_eq!(engine.advance(stage_answers(1)).await.unwrap(), 2);
        assert_eq!(engine.advance(stage_answers(2)).await.unwrap(), 3);
        assert!(db.get_stage_answers("u1", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn capture_timer_records_duration() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        engine.advance(stage_answers(1)).await.unwrap();

        // Not on the capture stage yet.
        assert!(!engine.record_input("typing").unwrap());
        engine.advance(stage_answers(2)).await.unwrap();

        assert!(!engine.record_input("   ").unwrap());
        assert!(engine.record_input("R").unwrap());
        tokio::time::sleep(Duration::from_millis(15)).await;
        engine.advance(stage_answers(3)).await.unwrap();

        assert!(!engine.capture_running());
        let millis = engine.answers().accomplishment_capture_millis.unwrap();
        assert!(millis >= 15, "recorded {millis}ms");
    }

    #[tokio::test]
    async fn submitted_capture_duration_is_ignored() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        let mut forged = stage_answers(1);
        forged.accomplishment_capture_millis = Some(1);
        engine.advance(forged).await.unwrap();
        assert!(engine.answers().accomplishment_capture_millis.is_none());

        engine.advance(stage_answers(2)).await.unwrap();
        engine.record_input("R").unwrap();
        let mut forged = stage_answers(3);
        forged.accomplishment_capture_millis = Some(999_999_999);
        engine.advance(forged).await.unwrap();
        let millis = engine.answers().accomplishment_capture_millis.unwrap();
        assert!(millis < 999_999_999);
    }

    #[tokio::test]
    async fn capture_without_input_records_nothing() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        for stage in 1..=3 {
            engine.advance(stage_answers(stage)).await.unwrap();
        }
        assert!(engine.answers().accomplishment_capture_millis.is_none());
    }

    #[tokio::test]
    async fn advance_at_terminal_stays() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        walk_to_terminal(&mut engine).await;
        assert_eq!(engine.current_stage(), TERMINAL_STAGE);
        assert_eq!(
            engine.advance(Answers::default()).await.unwrap(),
            TERMINAL_STAGE
        );
    }

    #[tokio::test]
    async fn complete_before_terminal_fails() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        let err = engine.complete().await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::NotAtTerminalStage {
                current: 1,
                terminal: 14
            }
        ));
    }

    #[tokio::test]
    async fn end_to_end_scenario() {
        let db = memory_db();
        let mut engine = StageEngine::start("u1", db.clone()).await;
        walk_to_terminal(&mut engine).await;

        let outcome = engine.complete().await.unwrap();
        let profile = &outcome.profile;
        assert_eq!(profile.primary_type, "Complexity Overwhelm");
        assert_eq!(profile.procrastination_level, ProcrastinationLevel::High);
        assert_eq!(profile.dopamine_sensitivity, DopamineSensitivity::Responsive);
        assert_eq!(profile.complexity_tolerance, ComplexityTolerance::Low);
        assert_eq!(profile.success_probability, 50);
        for risk in [
            "High baseline anxiety",
            "Chronic procrastination pattern",
            "High resistance to change",
        ] {
            assert!(profile.risk_factors.iter().any(|r| r == risk), "{risk}");
        }
        assert_eq!(outcome.program.work_duration, 45);
        assert_eq!(outcome.stats.total_points, 100);
        assert_eq!(outcome.point_rewards.len(), 5);

        assert!(engine.session().is_completed());
        assert_eq!(db.get_profile("u1").await.unwrap().unwrap(), outcome.profile);
    }

    #[tokio::test]
    async fn failed_commit_leaves_session_retryable() {
        let db = memory_db();
        let mut engine = StageEngine::start("u1", db.clone()).await;
        walk_to_terminal(&mut engine).await;
        let answers_before = engine.answers().clone();

        db.set_fail_completion(true);
        let err = engine.complete().await.unwrap_err();
        assert!(matches!(err, CompletionError::Commit(_)));
        assert!(!engine.session().is_completed());
        assert_eq!(engine.answers(), &answers_before);
        assert!(db.get_profile("u1").await.unwrap().is_none());
        assert!(db.list_point_rewards("u1").await.unwrap().is_empty());

        db.set_fail_completion(false);
        let outcome = engine.complete().await.unwrap();
        assert_eq!(outcome.profile.success_probability, 50);
    }

    #[tokio::test]
    async fn completed_session_is_immutable() {
        let mut engine = StageEngine::start("u1", memory_db()).await;
        walk_to_terminal(&mut engine).await;
        engine.complete().await.unwrap();

        assert!(matches!(
            engine.complete().await,
            Err(CompletionError::AlreadyCompleted { .. })
        ));
        assert!(matches!(
            engine.advance(Answers::default()).await,
            Err(ValidationError::SessionCompleted { .. })
        ));
        assert!(matches!(
            engine.go_back().await,
            Err(ValidationError::SessionCompleted { .. })
        ));
        assert!(engine.record_input("x").is_err());
    }

    #[tokio::test]
    async fn incomplete_terminal_answers_rejected() {
        let mut session = Session::new("u1");
        session.current_stage = TERMINAL_STAGE;
        let mut engine = StageEngine::new(session, memory_db());
        assert!(matches!(
            engine.complete().await,
            Err(CompletionError::Incomplete(ValidationError::MissingField {
                stage: 14,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn completes_against_libsql() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mut engine = StageEngine::start("u1", db.clone()).await;
        walk_to_terminal(&mut engine).await;
        engine.complete().await.unwrap();

        let loaded = db.load_session("u1").await.unwrap().unwrap();
        assert!(loaded.is_completed());
        assert_eq!(loaded.answers, *engine.answers());
        assert_eq!(db.list_point_rewards("u1").await.unwrap().len(), 5);
    }
}
