//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. The completion commit and
//! schedule replacement run inside a libSQL transaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assessment::{Answers, Session};
use crate::error::DatabaseError;
use crate::profile::Profile;
use crate::program::{Program, UserStats};
use crate::rewards::{
    PersonalizationInput, PointReward, RewardSchedule, RewardTier, ScheduledReward, TriggerType,
};
use crate::store::migrations;
use crate::store::traits::{CompletionCommit, Database, SavedSchedule};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use,
/// but a transaction covers every statement on the connection. All writes
/// therefore hold `write_lock`, so one user's rollback never discards
/// another user's write and transactions never nest.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(dt.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

const SESSION_COLUMNS: &str =
    "user_id, current_stage, answers, started_at, completed_at, stage_history";

const POINT_REWARD_COLUMNS: &str =
    "id, user_id, title, description, points_required, category, reward_type, is_claimed, claimed_at";

const SCHEDULED_COLUMNS: &str =
    "id, reward_id, tier, trigger_type, trigger_value, is_active, claimed";

/// Map a libsql Row to a Session. Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<Session, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("session row parse: {e}"));
    let user_id: String = row.get(0).map_err(get_err)?;
    let stage: i64 = row.get(1).map_err(get_err)?;
    let answers_str: String = row.get(2).map_err(get_err)?;
    let started_str: String = row.get(3).map_err(get_err)?;
    let completed_str: Option<String> = row.get(4).ok();
    let history_str: String = row.get(5).map_err(get_err)?;

    Ok(Session {
        user_id,
        current_stage: u8::try_from(stage)
            .map_err(|_| DatabaseError::Serialization(format!("stage out of range: {stage}")))?,
        answers: from_json(&answers_str)?,
        history: from_json(&history_str)?,
        started_at: parse_datetime(&started_str),
        completed_at: parse_optional_datetime(&completed_str),
    })
}

/// Column order matches POINT_REWARD_COLUMNS.
fn row_to_point_reward(row: &libsql::Row) -> Result<PointReward, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("point reward row parse: {e}"));
    let id_str: String = row.get(0).map_err(get_err)?;
    let points: i64 = row.get(4).map_err(get_err)?;
    let category: String = row.get(5).map_err(get_err)?;
    let is_claimed: i64 = row.get(7).map_err(get_err)?;
    let claimed_str: Option<String> = row.get(8).ok();

    Ok(PointReward {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1).map_err(get_err)?,
        title: row.get(2).map_err(get_err)?,
        description: row.get(3).map_err(get_err)?,
        points_required: points as u32,
        category: category
            .parse::<RewardTier>()
            .map_err(DatabaseError::Serialization)?,
        reward_type: row.get(6).map_err(get_err)?,
        is_claimed: is_claimed != 0,
        claimed_at: parse_optional_datetime(&claimed_str),
    })
}

/// Column order matches SCHEDULED_COLUMNS.
fn row_to_scheduled(row: &libsql::Row) -> Result<ScheduledReward, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("schedule row parse: {e}"));
    let tier: String = row.get(2).map_err(get_err)?;
    let trigger_type: String = row.get(3).map_err(get_err)?;
    let trigger_value: i64 = row.get(4).map_err(get_err)?;
    let is_active: i64 = row.get(5).map_err(get_err)?;
    let claimed: i64 = row.get(6).map_err(get_err)?;

    Ok(ScheduledReward {
        id: row.get(0).map_err(get_err)?,
        reward_id: row.get(1).map_err(get_err)?,
        tier: tier.parse().map_err(DatabaseError::Serialization)?,
        trigger_type: trigger_type
            .parse::<TriggerType>()
            .map_err(DatabaseError::Serialization)?,
        trigger_value: trigger_value as u32,
        is_active: is_active != 0,
        claimed: claimed != 0,
    })
}

/// Upsert the session row.
async fn upsert_session(conn: &Connection, session: &Session) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO assessment_sessions (user_id, current_stage, answers, started_at, completed_at, updated_at, stage_history)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (user_id) DO UPDATE SET
            current_stage = ?2, answers = ?3, completed_at = ?5, updated_at = ?6, stage_history = ?7",
        params![
            session.user_id.as_str(),
            session.current_stage as i64,
            to_json(&session.answers)?,
            session.started_at.to_rfc3339(),
            opt_datetime(session.completed_at),
            now,
            to_json(&session.history)?
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("upsert_session: {e}")))?;
    Ok(())
}

/// All completion writes. Runs on the transaction's connection.
async fn write_completion(conn: &Connection, commit: &CompletionCommit) -> Result<(), DatabaseError> {
    let user_id = commit.user_id.as_str();
    let created_at = commit.completed_at.to_rfc3339();

    conn.execute(
        "INSERT INTO profiles (user_id, primary_type, success_probability, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            commit.profile.primary_type.as_str(),
            commit.profile.success_probability as i64,
            to_json(&commit.profile)?,
            created_at.as_str()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert profile: {e}")))?;

    conn.execute(
        "INSERT INTO programs (user_id, work_duration, break_duration, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            commit.program.work_duration as i64,
            commit.program.break_duration as i64,
            to_json(&commit.program)?,
            created_at.as_str()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert program: {e}")))?;

    let stats = &commit.stats;
    conn.execute(
        "INSERT INTO user_stats (user_id, total_points, current_streak, longest_streak, tasks_completed, protocols_completed, preferred_work_duration, preferred_break_duration, peak_productivity_hours)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user_id,
            stats.total_points as i64,
            stats.current_streak as i64,
            stats.longest_streak as i64,
            stats.tasks_completed as i64,
            stats.protocols_completed as i64,
            stats.preferred_work_duration as i64,
            stats.preferred_break_duration as i64,
            to_json(&stats.peak_productivity_hours)?
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert user_stats: {e}")))?;

    for reward in &commit.point_rewards {
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO point_rewards ({POINT_REWARD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                reward.id.to_string(),
                reward.user_id.as_str(),
                reward.title.as_str(),
                reward.description.as_str(),
                reward.points_required as i64,
                reward.category.to_string(),
                reward.reward_type.as_str(),
                reward.is_claimed as i64,
                opt_datetime(reward.claimed_at)
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert point_reward: {e}")))?;
    }

    // Stage stays where the session was; only completion fields change.
    let rows = conn
        .execute(
            "UPDATE assessment_sessions SET answers = ?2, completed_at = ?3, updated_at = ?3
             WHERE user_id = ?1 AND completed_at IS NULL",
            params![user_id, to_json(&commit.answers)?, created_at.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("complete session: {e}")))?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity: "open session".to_string(),
            id: user_id.to_string(),
        });
    }

    Ok(())
}

async fn write_schedule(
    conn: &Connection,
    user_id: &str,
    saved: &SavedSchedule,
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM scheduled_rewards WHERE user_id = ?1",
        params![user_id],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("clear schedule: {e}")))?;

    for (position, slot) in saved.schedule.rewards.iter().enumerate() {
        conn.execute(
            &format!(
                "INSERT INTO scheduled_rewards (user_id, position, {SCHEDULED_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                user_id,
                position as i64,
                slot.id.as_str(),
                slot.reward_id.as_str(),
                slot.tier.to_string(),
                slot.trigger_type.to_string(),
                slot.trigger_value as i64,
                slot.is_active as i64,
                slot.claimed as i64
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert scheduled_reward: {e}")))?;
    }

    conn.execute(
        "INSERT INTO reward_personalization (user_id, input, generated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id) DO UPDATE SET input = ?2, generated_at = ?3",
        params![
            user_id,
            to_json(&saved.personalization)?,
            saved.generated_at.to_rfc3339()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("upsert personalization: {e}")))?;

    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn save_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        upsert_session(self.conn(), session).await
    }

    async fn save_stage(
        &self,
        session: &Session,
        stage: u8,
        partial: &Answers,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO assessment_stage_answers (user_id, stage, answers, saved_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, stage) DO UPDATE SET answers = ?3, saved_at = ?4",
            params![
                session.user_id.as_str(),
                stage as i64,
                to_json(partial)?,
                Utc::now().to_rfc3339()
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_stage: {e}")))?;

        upsert_session(conn, session).await?;
        debug!(user_id = %session.user_id, stage, "Stage answers saved");
        Ok(())
    }

    async fn load_session(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM assessment_sessions WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_session: {e}"))),
        }
    }

    async fn get_stage_answers(
        &self,
        user_id: &str,
        stage: u8,
    ) -> Result<Option<Answers>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT answers FROM assessment_stage_answers WHERE user_id = ?1 AND stage = ?2",
                params![user_id, stage as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_stage_answers: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_stage_answers: {e}")))?;
                Ok(Some(from_json(&json)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_stage_answers: {e}"))),
        }
    }

    // ── Completion ──────────────────────────────────────────────────

    async fn commit_completion(&self, commit: &CompletionCommit) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;

        let result = write_completion(&tx, commit).await;
        match result {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;
                info!(user_id = %commit.user_id, "Completion committed");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(user_id = %commit.user_id, error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT data FROM profiles WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;
                Ok(Some(from_json(&json)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn get_program(&self, user_id: &str) -> Result<Option<Program>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT data FROM programs WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_program: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_program: {e}")))?;
                Ok(Some(from_json(&json)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_program: {e}"))),
        }
    }

    async fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT total_points, current_streak, longest_streak, tasks_completed, protocols_completed,
                        preferred_work_duration, preferred_break_duration, peak_productivity_hours
                 FROM user_stats WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_stats: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_user_stats: {e}"))),
        };

        let get_err = |e: libsql::Error| DatabaseError::Query(format!("get_user_stats: {e}"));
        let int = |i: i32| -> Result<u32, DatabaseError> {
            let v: i64 = row.get(i).map_err(get_err)?;
            Ok(v as u32)
        };
        let hours: String = row.get(7).map_err(get_err)?;

        Ok(Some(UserStats {
            total_points: int(0)?,
            current_streak: int(1)?,
            longest_streak: int(2)?,
            tasks_completed: int(3)?,
            protocols_completed: int(4)?,
            preferred_work_duration: int(5)?,
            preferred_break_duration: int(6)?,
            peak_productivity_hours: from_json(&hours)?,
        }))
    }

    async fn list_point_rewards(&self, user_id: &str) -> Result<Vec<PointReward>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {POINT_REWARD_COLUMNS} FROM point_rewards
                     WHERE user_id = ?1 ORDER BY points_required ASC"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_point_rewards: {e}")))?;

        let mut rewards = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => rewards.push(row_to_point_reward(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("list_point_rewards: {e}"))),
            }
        }
        Ok(rewards)
    }

    // ── Reward schedules ────────────────────────────────────────────

    async fn save_reward_schedule(
        &self,
        user_id: &str,
        saved: &SavedSchedule,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;

        let result = write_schedule(&tx, user_id, saved).await;
        match result {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;
                debug!(user_id, slots = saved.schedule.len(), "Reward schedule saved");
                Ok(())
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(user_id, error = %rb, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get_reward_schedule(
        &self,
        user_id: &str,
    ) -> Result<Option<SavedSchedule>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT input, generated_at FROM reward_personalization WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_reward_schedule: {e}")))?;

        let (personalization, generated_at) = match rows.next().await {
            Ok(Some(row)) => {
                let get_err =
                    |e: libsql::Error| DatabaseError::Query(format!("get_reward_schedule: {e}"));
                let input: String = row.get(0).map_err(get_err)?;
                let generated: String = row.get(1).map_err(get_err)?;
                (
                    from_json::<PersonalizationInput>(&input)?,
                    parse_datetime(&generated),
                )
            }
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_reward_schedule: {e}"))),
        };

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {SCHEDULED_COLUMNS} FROM scheduled_rewards
                     WHERE user_id = ?1 ORDER BY position ASC"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_reward_schedule: {e}")))?;

        let mut rewards = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => rewards.push(row_to_scheduled(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("get_reward_schedule: {e}"))),
            }
        }

        Ok(Some(SavedSchedule {
            personalization,
            schedule: RewardSchedule { rewards },
            generated_at,
        }))
    }
}
