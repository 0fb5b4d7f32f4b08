//! Schema migrations for the assessment store.
//!
//! Applied versions are recorded in `_migrations`; opening a database only
//! runs the steps above the highest recorded version, in order.

use libsql::Connection;

use crate::error::DatabaseError;

/// One numbered schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ascending by version. Never edit a released step, append a new one.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "assessment_sessions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS assessment_sessions (
                user_id TEXT PRIMARY KEY,
                current_stage INTEGER NOT NULL,
                answers TEXT NOT NULL DEFAULT '{}',
                started_at TEXT NOT NULL,
                completed_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assessment_stage_answers (
                user_id TEXT NOT NULL,
                stage INTEGER NOT NULL,
                answers TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY (user_id, stage)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "completion_artifacts",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                primary_type TEXT NOT NULL,
                success_probability INTEGER NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS programs (
                user_id TEXT PRIMARY KEY,
                work_duration INTEGER NOT NULL,
                break_duration INTEGER NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id TEXT PRIMARY KEY,
                total_points INTEGER NOT NULL,
                current_streak INTEGER NOT NULL DEFAULT 0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                tasks_completed INTEGER NOT NULL DEFAULT 0,
                protocols_completed INTEGER NOT NULL DEFAULT 0,
                preferred_work_duration INTEGER NOT NULL,
                preferred_break_duration INTEGER NOT NULL,
                peak_productivity_hours TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS point_rewards (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                points_required INTEGER NOT NULL,
                category TEXT NOT NULL,
                reward_type TEXT NOT NULL,
                is_claimed INTEGER NOT NULL DEFAULT 0,
                claimed_at TEXT,
                UNIQUE (user_id, title)
            );
            CREATE INDEX IF NOT EXISTS idx_point_rewards_user ON point_rewards(user_id);
        "#,
    },
    Migration {
        version: 3,
        name: "reward_schedules",
        sql: r#"
            CREATE TABLE IF NOT EXISTS reward_personalization (
                user_id TEXT PRIMARY KEY,
                input TEXT NOT NULL,
                generated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_rewards (
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                position INTEGER NOT NULL,
                reward_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                trigger_value INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                claimed INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, id)
            );
        "#,
    },
    Migration {
        version: 4,
        name: "session_stage_history",
        sql: r#"
            ALTER TABLE assessment_sessions ADD COLUMN stage_history TEXT NOT NULL DEFAULT '[]';
        "#,
    },
];

/// Bring the schema on `conn` up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");

    Ok(())
}

/// Highest recorded version; 0 on a fresh database.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Record `version` as applied.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, table: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                libsql::params![table],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        count == 1
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &[
            "_migrations",
            "assessment_sessions",
            "assessment_stage_answers",
            "profiles",
            "programs",
            "user_stats",
            "point_rewards",
            "reward_personalization",
            "scheduled_rewards",
        ] {
            assert!(table_exists(&conn, table).await, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let version = get_current_version(&conn).await.unwrap();
        assert_eq!(version, 4);
    }

    #[tokio::test]
    async fn partial_database_catches_up() {
        let conn = test_conn().await;
        conn.execute(
            "CREATE TABLE _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            (),
        )
        .await
        .unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).await.unwrap();
        seed_version(&conn, 1, MIGRATIONS[0].name).await.unwrap();

        run_migrations(&conn).await.unwrap();

        assert_eq!(get_current_version(&conn).await.unwrap(), 4);
        assert!(table_exists(&conn, "profiles").await);
        assert!(table_exists(&conn, "scheduled_rewards").await);
    }

    #[tokio::test]
    async fn point_rewards_unique_per_user_title() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let insert = "INSERT OR IGNORE INTO point_rewards
            (id, user_id, title, description, points_required, category, reward_type)
            VALUES (?1, 'u1', 'Movie Night', 'd', 750, 'mini', 'entertainment')";
        conn.execute(insert, libsql::params!["a"]).await.unwrap();
        let second = conn.execute(insert, libsql::params!["b"]).await.unwrap();
        assert_eq!(second, 0);
    }
}
